use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use regex::Regex;

use crate::errors::Error;

/// Bounds checks a cpu quantity and converts it to fractional millicpu
///
/// # Arguments
///
/// * `raw` - Raw cpu quantity
pub fn cpu(raw: Option<&Quantity>) -> Result<f64, Error> {
    // if raw is None then return 0
    let raw = match raw {
        Some(raw) => &raw.0,
        None => return Ok(0.0),
    };

    // try to cast this directly to a f64
    // This is because we assume that any f64 value is # of cores
    // if parse was successful then convert to millicpu
    if let Ok(cores) = raw.parse::<f64>() {
        return Ok(cores * 1000.0);
    }

    // f64 parse failed check if it ends in a millicpu unit
    if let Some(amt) = raw.strip_suffix('m') {
        // try to parse as millicpu
        return match amt.parse::<f64>() {
            Ok(millicpu) => Ok(millicpu),
            Err(_) => Err(Error::new(format!("Invalid cpu value: {}", raw))),
        };
    }
    // error if all of the cpu handlers failed
    Err(Error::new(format!("Failed to parse cpu value: {}", raw)))
}

/// Bounds checks a memory quantity and converts it to fractional bytes
///
/// # Arguments
///
/// * `raw` - Raw memory quantity
pub fn memory(raw: Option<&Quantity>) -> Result<f64, Error> {
    // if raw is None then return 0
    let raw = match raw {
        Some(raw) => &raw.0,
        None => return Ok(0.0),
    };

    // try to cast this directly to a f64
    // This is because we assume that any f64 value is # of bytes
    if let Ok(bytes) = raw.parse::<f64>() {
        return Ok(bytes);
    }

    // f64 failed parse so lets find the first occurence of any valid unit char
    let unit_regex = match Regex::new(r"[KMGTPE]") {
        Ok(unit_regex) => unit_regex,
        Err(err) => return Err(Error::new(format!("Invalid unit regex: {}", err))),
    };
    // find index where the unit starts
    let reg = match unit_regex.find(raw) {
        Some(reg) => reg,
        None => return Err(Error::new(format!("Failed to parse memory value: {}", raw))),
    };
    // split raw based on where the unit was found
    let (amt, unit) = raw.split_at(reg.start());
    // cast amt to f64
    let amt = match amt.parse::<f64>() {
        Ok(amt) => amt,
        Err(_) => return Err(Error::new(format!("Invalid memory value: {}", raw))),
    };
    // convert to bytes
    let bytes = match unit {
        "K" => amt * 1e3,
        "M" => amt * 1e6,
        "G" => amt * 1e9,
        "T" => amt * 1e12,
        "P" => amt * 1e15,
        "E" => amt * 1e18,
        "Ki" => amt * 1024.0,
        "Mi" => amt * 1024.0 * 1024.0,
        "Gi" => amt * 1024.0 * 1024.0 * 1024.0,
        "Ti" => amt * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "Pi" => amt * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "Ei" => amt * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => {
            return Err(Error::new(format!(
                "Failed to parse memory value: {}",
                raw
            )))
        }
    };
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_cores() {
        let quantity = Quantity("2".to_owned());
        assert_eq!(cpu(Some(&quantity)).unwrap(), 2000.0);
    }

    #[test]
    fn test_cpu_fractional_cores() {
        let quantity = Quantity("0.5".to_owned());
        assert_eq!(cpu(Some(&quantity)).unwrap(), 500.0);
    }

    #[test]
    fn test_cpu_millicpu() {
        let quantity = Quantity("1500m".to_owned());
        assert_eq!(cpu(Some(&quantity)).unwrap(), 1500.0);
    }

    #[test]
    fn test_cpu_missing() {
        assert_eq!(cpu(None).unwrap(), 0.0);
    }

    #[test]
    fn test_cpu_invalid() {
        let quantity = Quantity("lots".to_owned());
        assert!(cpu(Some(&quantity)).is_err());
    }

    #[test]
    fn test_memory_bytes() {
        let quantity = Quantity("1048576".to_owned());
        assert_eq!(memory(Some(&quantity)).unwrap(), 1_048_576.0);
    }

    #[test]
    fn test_memory_binary_units() {
        let gibi = Quantity("1Gi".to_owned());
        assert_eq!(memory(Some(&gibi)).unwrap(), 1_073_741_824.0);
        let mebi = Quantity("512Mi".to_owned());
        assert_eq!(memory(Some(&mebi)).unwrap(), 536_870_912.0);
    }

    #[test]
    fn test_memory_decimal_units() {
        let giga = Quantity("2G".to_owned());
        assert_eq!(memory(Some(&giga)).unwrap(), 2e9);
    }

    #[test]
    fn test_memory_invalid() {
        let quantity = Quantity("big".to_owned());
        assert!(memory(Some(&quantity)).is_err());
    }
}
