//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;
use toml;

// Internal imports
use crate::host;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable ({}) is not set", host::ROOT_ENV_VAR)]
    RootNotSet,

    #[error("Cannot load the parameter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// Relative paths are resolved against the software root's `params`
/// directory. Absolute paths (as handed over by an external harness) are
/// used as-is.
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    let path = if Path::new(param_file_path).is_absolute() {
        Path::new(param_file_path).to_path_buf()
    } else {
        let mut path = host::get_root().map_err(|_| LoadError::RootNotSet)?;
        path.push("params");
        path.push(param_file_path);
        path
    };

    // Load the file into a string
    let params_str = match read_to_string(path) {
        Ok(s) => s,
        Err(e) => return Err(LoadError::FileLoadError(e)),
    };

    // Parse the string into the parameter struct
    match toml::from_str(params_str.as_str()) {
        Ok(p) => Ok(p),
        Err(e) => Err(LoadError::DeserialiseError(e)),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Deserialize)]
    struct TestParams {
        cycle_period_s: f64,
        exec_name: String,
    }

    #[test]
    fn test_load_absolute_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cycle_period_s = 0.05\nexec_name = \"demo\"").unwrap();

        let path = file.path().to_str().unwrap();
        let params: TestParams = load(path).unwrap();

        assert_eq!(params.cycle_period_s, 0.05);
        assert_eq!(params.exec_name, "demo");
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cycle_period_s = ").unwrap();

        let path = file.path().to_str().unwrap();
        let result = load::<TestParams>(path);

        assert!(matches!(result, Err(LoadError::DeserialiseError(_))));
    }
}
