use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

pub struct Config {
    pub server: ServerConfig,
    pub timing: TimingConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Durations driving the phase scheduler. All env-overridable so tests and
/// rehearsal deployments can run a full session in milliseconds.
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Instructions screen before the sample quiz starts
    pub instructions: Duration,
    /// Answer window for a sample question
    pub sample_question: Duration,
    /// Answer window for a main question
    pub main_question: Duration,
    /// How long sample-quiz results stay up before the countdown
    pub results_hold: Duration,
    /// Countdown before the next question opens
    pub countdown: Duration,
    /// Sample-ranking screen before preparation begins
    pub sample_ranking: Duration,
    /// Preparation screen before the main quiz starts
    pub preparation: Duration,
    /// How long clients hold the final ranking screen; advisory, nothing is
    /// scheduled after the game ends
    pub game_end_screen: Duration,
    /// Small gap between a phase broadcast and the question opening,
    /// giving clients time to render
    pub question_open_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            instructions: Duration::from_secs(15),
            sample_question: Duration::from_secs(20),
            main_question: Duration::from_secs(60),
            results_hold: Duration::from_secs(3),
            countdown: Duration::from_secs(3),
            sample_ranking: Duration::from_secs(10),
            preparation: Duration::from_secs(10),
            game_end_screen: Duration::from_secs(15),
            question_open_delay: Duration::from_millis(100),
        }
    }
}

impl TimingConfig {
    /// Ranking penalty for a wrong or missing sample answer, in milliseconds.
    /// Equals the full answer window so speed only counts when correct.
    pub fn sample_penalty_ms(&self) -> u64 {
        self.sample_question.as_millis() as u64
    }

    /// Ranking penalty for a wrong or missing main answer, in milliseconds
    pub fn main_penalty_ms(&self) -> u64 {
        self.main_question.as_millis() as u64
    }
}

fn duration_from_env_ms(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = TimingConfig::default();

        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3001".to_string())
                    .parse()
                    .expect("Invalid SERVER_PORT"),
            },
            timing: TimingConfig {
                instructions: duration_from_env_ms("QUIZ_INSTRUCTIONS_MS", defaults.instructions),
                sample_question: duration_from_env_ms(
                    "QUIZ_SAMPLE_QUESTION_MS",
                    defaults.sample_question,
                ),
                main_question: duration_from_env_ms(
                    "QUIZ_MAIN_QUESTION_MS",
                    defaults.main_question,
                ),
                results_hold: duration_from_env_ms("QUIZ_RESULTS_HOLD_MS", defaults.results_hold),
                countdown: duration_from_env_ms("QUIZ_COUNTDOWN_MS", defaults.countdown),
                sample_ranking: duration_from_env_ms(
                    "QUIZ_SAMPLE_RANKING_MS",
                    defaults.sample_ranking,
                ),
                preparation: duration_from_env_ms("QUIZ_PREPARATION_MS", defaults.preparation),
                game_end_screen: duration_from_env_ms(
                    "QUIZ_GAME_END_SCREEN_MS",
                    defaults.game_end_screen,
                ),
                question_open_delay: duration_from_env_ms(
                    "QUIZ_QUESTION_OPEN_DELAY_MS",
                    defaults.question_open_delay,
                ),
            },
        }
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        // Try to parse as IP address first
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::new(0, 0, 0, 0);
                }
            }
        }

        // Handle common hostnames
        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::new(127, 0, 0, 1),
            "" | "0.0.0.0" => Ipv4Addr::new(0, 0, 0, 0),
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::new(0, 0, 0, 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_localhost() {
        let config = Config {
            server: ServerConfig {
                host: "localhost".to_string(),
                port: 3001,
            },
            timing: TimingConfig::default(),
        };

        let addr = config.bind_address();
        assert_eq!(addr, ([127, 0, 0, 1], 3001));
    }

    #[test]
    fn test_parse_ipv4_address() {
        let config = Config {
            server: ServerConfig {
                host: "192.168.1.1".to_string(),
                port: 3000,
            },
            timing: TimingConfig::default(),
        };

        let addr = config.bind_address();
        assert_eq!(addr, ([192, 168, 1, 1], 3000));
    }

    #[test]
    fn test_parse_empty_host() {
        let config = Config {
            server: ServerConfig {
                host: "".to_string(),
                port: 3001,
            },
            timing: TimingConfig::default(),
        };

        let addr = config.bind_address();
        assert_eq!(addr, ([0, 0, 0, 0], 3001));
    }

    #[test]
    fn test_parse_invalid_hostname_defaults_to_all() {
        let config = Config {
            server: ServerConfig {
                host: "invalid-hostname".to_string(),
                port: 9000,
            },
            timing: TimingConfig::default(),
        };

        let addr = config.bind_address();
        assert_eq!(addr, ([0, 0, 0, 0], 9000));
    }

    #[test]
    fn test_penalty_matches_answer_window() {
        let timing = TimingConfig::default();
        assert_eq!(timing.sample_penalty_ms(), 20_000);
        assert_eq!(timing.main_penalty_ms(), 60_000);
    }
}
