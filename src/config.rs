//! Configuration: library defaults and the CLI arguments of the demo binary.
//!
use crate::CourierError;
use clap::Parser;

/// Default scope of a [`crate::runtime::ScopedMessenger`].
pub const DEFAULT_SCOPE: &str = "courier";

/// Default timeout for [`crate::Courier::send_timeout`] callers that have no better idea.
pub const DEFAULT_REQUEST_TIMEOUT: tokio::time::Duration = tokio::time::Duration::from_secs(5);

/// Destinations registered when none are given on the command line.
pub const DEFAULT_DESTINATIONS: [&str; 2] = ["background", "options"];

#[derive(Parser, Debug, Clone)]
pub struct CliArgs {
    /// Scope used for the runtime-scoped round trip.
    #[clap(long, default_value = DEFAULT_SCOPE)]
    pub scope: String,
    /// Number of correlated requests sent to each destination.
    #[clap(short, long, default_value_t = 3)]
    pub count: usize,
    /// Timeout of each correlated request, in milliseconds.
    #[clap(long, default_value_t = 5000)]
    pub timeout_ms: u64,
    /// Names of the destinations to register.
    pub destinations: Vec<String>,
}

impl CliArgs {
    /// The request timeout as a [`tokio::time::Duration`].
    pub fn timeout(&self) -> tokio::time::Duration {
        tokio::time::Duration::from_millis(self.timeout_ms)
    }

    /// Return the destination names, falling back to [`DEFAULT_DESTINATIONS`].
    ///
    /// Empty and repeated names are rejected, as the registry is keyed by name.
    pub fn destination_names(&self) -> Result<Vec<String>, CourierError> {
        if self.destinations.is_empty() {
            return Ok(DEFAULT_DESTINATIONS
                .iter()
                .map(|name| name.to_string())
                .collect());
        }

        let mut names: Vec<String> = Vec::with_capacity(self.destinations.len());
        for name in &self.destinations {
            if name.is_empty() {
                return Err(CourierError::InvalidDestinations(
                    "destination names cannot be empty".to_owned(),
                ));
            }
            if names.contains(name) {
                return Err(CourierError::InvalidDestinations(format!(
                    "\"{name}\" is given more than once"
                )));
            }
            names.push(name.clone());
        }

        Ok(names)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_destinations() {
        let args = CliArgs::parse_from(["echo"]);

        assert_eq!(args.scope, DEFAULT_SCOPE);
        assert_eq!(args.timeout(), tokio::time::Duration::from_secs(5));
        assert_eq!(
            args.destination_names().unwrap(),
            vec!["background".to_owned(), "options".to_owned()]
        );
    }

    #[test]
    fn repeated_destination() {
        let args = CliArgs::parse_from(["echo", "popup", "popup"]);

        assert!(matches!(
            args.destination_names(),
            Err(CourierError::InvalidDestinations(_))
        ));
    }
}
