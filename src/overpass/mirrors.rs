use crate::config::FetchConfig;
use crate::overpass::{GeodataSource, OverpassResponse};
use std::time::Duration;
use tracing::{info, warn};

/// Where the mirror rotation stands. Rounds and endpoints are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Trying { round: u32, endpoint: usize },
    // every endpoint failed in `round`, a pause precedes the next one
    Waiting { round: u32 },
    Exhausted,
}

/// Walks endpoints in order, round after round, until the round ceiling is hit.
#[derive(Debug, Clone)]
pub struct MirrorRotation {
    endpoints: usize,
    rounds: u32,
    state: FetchState,
}

impl MirrorRotation {
    pub fn new(endpoints: usize, rounds: u32) -> Self {
        let state = if endpoints == 0 || rounds == 0 {
            FetchState::Exhausted
        } else {
            FetchState::Trying {
                round: 0,
                endpoint: 0,
            }
        };
        Self {
            endpoints,
            rounds,
            state,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    /// The current attempt failed.
    pub fn fail(&mut self) -> FetchState {
        self.state = match self.state {
            FetchState::Trying { round, endpoint } if endpoint + 1 < self.endpoints => {
                FetchState::Trying {
                    round,
                    endpoint: endpoint + 1,
                }
            }
            FetchState::Trying { round, .. } if round + 1 < self.rounds => {
                FetchState::Waiting { round }
            }
            FetchState::Trying { .. } => FetchState::Exhausted,
            other => other,
        };
        self.state
    }

    /// The inter-round pause is over.
    pub fn resume(&mut self) -> FetchState {
        if let FetchState::Waiting { round } = self.state {
            self.state = FetchState::Trying {
                round: round + 1,
                endpoint: 0,
            };
        }
        self.state
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("every overpass endpoint failed in all {rounds} round(s): {}", describe(.last_failures))]
    Exhausted {
        rounds: u32,
        // (endpoint, last error seen from it)
        last_failures: Vec<(String, String)>,
    },
}

fn describe(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(endpoint, message)| format!("{} -> {}", endpoint, message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Runs `query` against the configured mirrors until one returns road ways.
pub async fn fetch_with_mirrors(
    source: &dyn GeodataSource,
    config: &FetchConfig,
    query: &str,
) -> Result<OverpassResponse, FetchError> {
    let mut rotation = MirrorRotation::new(config.endpoints.len(), config.rounds);
    let mut last_failures: Vec<Option<String>> = vec![None; config.endpoints.len()];

    loop {
        match rotation.state() {
            FetchState::Trying { round, endpoint } => {
                let url = &config.endpoints[endpoint];
                info!(round = round + 1, endpoint = %url, "querying overpass");

                let attempt = source.query(url, query).await.and_then(|response| {
                    if response.way_count() == 0 {
                        anyhow::bail!("response contained no ways");
                    }
                    Ok(response)
                });

                match attempt {
                    Ok(response) => {
                        info!(
                            endpoint = %url,
                            elements = response.elements.len(),
                            ways = response.way_count(),
                            "overpass query succeeded"
                        );
                        return Ok(response);
                    }
                    Err(e) => {
                        let message = format!("{:#}", e);
                        warn!(round = round + 1, endpoint = %url, error = %message, "overpass attempt failed");
                        last_failures[endpoint] = Some(message);
                        rotation.fail();
                    }
                }
            }
            FetchState::Waiting { round } => {
                info!(
                    round = round + 1,
                    delay_secs = config.round_delay.as_secs_f64(),
                    "all endpoints failed this round, waiting before retrying"
                );
                pause(config.round_delay).await;
                rotation.resume();
            }
            FetchState::Exhausted => {
                let last_failures = config
                    .endpoints
                    .iter()
                    .cloned()
                    .zip(last_failures)
                    .map(|(endpoint, failure)| {
                        (endpoint, failure.unwrap_or_else(|| "never attempted".to_string()))
                    })
                    .collect();
                return Err(FetchError::Exhausted {
                    rounds: config.rounds,
                    last_failures,
                });
            }
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
