use clap::Parser;

/// The command line args to pass to the quota controller
#[derive(Parser, Debug, Clone)]
#[clap(version, author)]
pub struct Args {
    /// The path to load the config file from
    #[clap(short, long, default_value = "quotad.yml")]
    pub config: String,
}
