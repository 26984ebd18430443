//! Drive the coordinator interactively.
//!
//! Starts the [`App`] against in-memory identity and sync services seeded
//! from the `[mock]` config section, then reads one command per line from
//! stdin. Connectivity is whatever the operator types.

use anyhow::{Context, Result};
use shelf_client::{App, ConnectivitySignal, IdentityService, MockIdentity, MockSync};
use shelf_types::SyncResult;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;

const HELP: &str = "\
commands:
  online | offline          change reachability
  login <email> <password>  sign in
  logout                    sign out
  refresh                   re-query the identity service
  sync                      request a sync now
  status                    print session and sync status
  help                      show this text
  quit                      stop";

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Set reachability.
    Connectivity(bool),
    /// Sign in.
    Login {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },
    /// Sign out.
    Logout,
    /// Re-query the identity service.
    Refresh,
    /// Request a sync.
    Sync,
    /// Print status.
    Status,
    /// Print help.
    Help,
    /// Stop.
    Quit,
}

impl Input {
    /// Parse a line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };

        let input = match command.to_ascii_lowercase().as_str() {
            "online" | "up" => Self::Connectivity(true),
            "offline" | "down" => Self::Connectivity(false),
            "login" => match (words.next(), words.next()) {
                (Some(email), Some(password)) => Self::Login {
                    email: email.to_string(),
                    password: password.to_string(),
                },
                _ => return Err("usage: login <email> <password>".to_string()),
            },
            "logout" => Self::Logout,
            "refresh" => Self::Refresh,
            "sync" => Self::Sync,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '{}' (try 'help')", other)),
        };
        Ok(Some(input))
    }
}

/// Whether the loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Stop the loop.
    Stop,
}

/// Run the run command.
pub async fn run(config: &Config) -> Result<()> {
    let (identity, sync) = build_services(config);
    let connectivity = ConnectivitySignal::new(config.connectivity.initially_connected);
    let app = App::start(config.coordinator(), identity, sync, connectivity).await;
    tracing::info!(
        "Driver ready: sync_on_login={}, timeout={}s",
        config.sync.sync_on_login,
        config.sync.timeout_secs
    );

    println!("shelf-sync running. Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match Input::parse(&line) {
            Ok(Some(input)) => {
                if execute(&app, input).await? == Flow::Stop {
                    break;
                }
            }
            Ok(None) => {}
            Err(message) => {
                tracing::debug!("Ignoring input line: {}", message);
                println!("{}", message);
            }
        }
    }

    tracing::info!("Driver stopping");
    app.shutdown().await;
    Ok(())
}

/// Build the in-memory services described by the `[mock]` section.
pub fn build_services(config: &Config) -> (MockIdentity, MockSync) {
    let mock = &config.mock;
    let identity = MockIdentity::new();
    let user = identity.add_account(&mock.email, &mock.password, &mock.name);
    if mock.restore_session {
        identity.restore_session(&user.id);
    }

    let sync = MockSync::with_item_count(mock.synced_items);
    for _ in 0..mock.failing_syncs {
        sync.queue_result(Ok(SyncResult::failed(["simulated failure"])));
    }
    (identity, sync)
}

/// Apply one input to the running app.
pub async fn execute<I>(app: &App<I>, input: Input) -> Result<Flow>
where
    I: IdentityService + 'static,
{
    match input {
        Input::Connectivity(connected) => {
            if !app.connectivity().set(connected) {
                tracing::debug!("Connectivity unchanged: {}", connected);
                println!("already {}", if connected { "online" } else { "offline" });
            }
        }
        Input::Login { email, password } => match app.session().login(&email, &password).await {
            Ok(_) => println!("logged in as {}", email),
            Err(e) => {
                tracing::warn!("Driver login for {} failed: {}", email, e);
                println!("login failed: {}", e);
            }
        },
        Input::Logout => match app.session().logout().await {
            Ok(_) => println!("logged out"),
            Err(e) => {
                tracing::warn!("Driver logout failed: {}", e);
                println!("logout failed: {}", e);
            }
        },
        Input::Refresh => {
            let session = app.session().refresh_current_user().await;
            match session.user() {
                Some(user) => println!("session: {} <{}>", user.name, user.email),
                None => println!("session: logged out"),
            }
        }
        Input::Sync => app.sync_now().await,
        Input::Status => {
            let status = app.sync_status();
            tracing::debug!(
                "Status requested: {} started, {} completed",
                status.started,
                status.completed
            );
            let report = serde_json::json!({
                "session": app.session().current(),
                "connected": app.connectivity().is_connected(),
                "sync": status,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to render status")?
            );
        }
        Input::Help => println!("{}", HELP),
        Input::Quit => return Ok(Flow::Stop),
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parse_commands() {
        assert_eq!(Input::parse("online"), Ok(Some(Input::Connectivity(true))));
        assert_eq!(Input::parse("  OFFLINE "), Ok(Some(Input::Connectivity(false))));
        assert_eq!(
            Input::parse("login ada@example.com pw"),
            Ok(Some(Input::Login {
                email: "ada@example.com".into(),
                password: "pw".into()
            }))
        );
        assert_eq!(Input::parse("quit"), Ok(Some(Input::Quit)));
        assert_eq!(Input::parse(""), Ok(None));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(Input::parse("login only-email").is_err());
        assert!(Input::parse("fly").unwrap_err().contains("unknown command"));
    }

    #[tokio::test]
    async fn build_services_seeds_account() {
        let mut config = Config::default();
        config.mock.failing_syncs = 1;
        let (identity, sync) = build_services(&config);

        assert!(identity.signed_in().is_some());
        let result = shelf_client::SyncService::sync_all(&sync).await.unwrap();
        assert!(!result.success());
    }

    #[tokio::test]
    async fn failed_commands_keep_the_loop_running() {
        let mut config = Config::default();
        config.mock.restore_session = false;
        let (identity, sync) = build_services(&config);
        let app = App::start(
            config.coordinator(),
            identity.clone(),
            sync,
            ConnectivitySignal::new(true),
        )
        .await;

        let bad_login = Input::Login {
            email: "reader@example.com".into(),
            password: "wrong".into(),
        };
        assert_eq!(execute(&app, bad_login).await.unwrap(), Flow::Continue);
        assert_eq!(
            execute(&app, Input::Connectivity(true)).await.unwrap(),
            Flow::Continue
        );
        identity.fail_next_logout(shelf_types::ServiceError::Timeout);
        assert_eq!(execute(&app, Input::Logout).await.unwrap(), Flow::Continue);

        assert_eq!(identity.login_calls(), 1);
        assert!(!app.session().is_logged_in());
        app.shutdown().await;
    }

    #[tokio::test]
    async fn scripted_session_drives_the_app() {
        let mut config = Config::default();
        config.mock.restore_session = false;
        let (identity, sync) = build_services(&config);
        let app = App::start(
            config.coordinator(),
            identity,
            sync.clone(),
            ConnectivitySignal::new(false),
        )
        .await;

        let script = [
            "login reader@example.com bookworm",
            "status",
            "online",
            "sync",
        ];
        for line in script {
            let input = Input::parse(line).unwrap().unwrap();
            assert_eq!(execute(&app, input).await.unwrap(), Flow::Continue);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let mut rx = app.subscribe_sync();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.completed >= 2))
            .await
            .expect("timed out waiting for syncs")
            .expect("coordinator stopped");
        assert!(app.session().is_logged_in());
        assert_eq!(sync.calls(), 2);

        let quit = execute(&app, Input::Quit).await.unwrap();
        assert_eq!(quit, Flow::Stop);
        app.shutdown().await;
    }
}
