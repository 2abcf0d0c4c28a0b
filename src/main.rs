use clap::Parser;
use quotad::args::Args;
use quotad::conf::Conf;
use quotad::QuotaController;

/// The quotad controller
#[tokio::main]
async fn main() {
    // install a crypto provider for rustls
    // Rustls will complain if this is not run but we can ignore any errors
    // https://github.com/rustls/rustls/issues/1938
    let _ = rustls::crypto::ring::default_provider().install_default();
    // get command line args
    let args = Args::parse();
    // try to load a config file
    let conf = Conf::new(&args.config).expect("Failed to load config");
    // setup our tracer
    quotad::utils::trace::setup("QuotadController", &conf.tracing);
    // build a client for the k8s api
    let client = kube::Client::try_default()
        .await
        .expect("Failed to build k8s client");
    // setup our controller
    let controller = QuotaController::new(conf, client);
    // start our controller
    controller.start().await.expect("Controller crashed");
}
