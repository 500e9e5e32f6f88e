//! Integration test common infrastructure.
//!
//! Builds a throwaway host (config dir, channel registry, persistence) in a
//! temporary directory.

#![allow(dead_code)]

use slircd_permchan::config::Config;
use slircd_permchan::permchan::PermChannels;
use slircd_permchan::permchan::gate::GateOutcome;
use slircd_permchan::state::{ChannelRegistry, ModeRegistry, ModeSource, StaticServerList};
use std::path::PathBuf;
use tempfile::TempDir;

pub const SERVER_NAME: &str = "test.server";
pub const DB_FILE: &str = "permchannels.conf";

/// A host process: registry plus persistence, sharing one config dir.
pub struct TestHost {
    pub dir: PathBuf,
    pub config: Config,
    pub registry: ChannelRegistry,
    pub permchans: PermChannels,
}

impl TestHost {
    /// Start a host whose `[permchanneldb]` block holds `db_settings`
    /// (`filename` is filled in) and whose trailing sections are `extra`.
    pub fn start(dir: &TempDir, db_settings: &str, extra: &str) -> Self {
        let config = write_config(dir, db_settings, extra);
        let mut registry = ChannelRegistry::new(SERVER_NAME, ModeRegistry::with_defaults());
        let permchans = PermChannels::new(&config);
        permchans.install(&mut registry).expect("install permanent mode");
        Self {
            dir: dir.path().to_path_buf(),
            config,
            registry,
            permchans,
        }
    }

    /// Fire the startup gate with `servers` known servers.
    pub fn ready(&mut self, servers: usize) -> GateOutcome {
        self.permchans
            .on_collaborators_ready(&mut self.registry, &StaticServerList(servers))
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.join(DB_FILE)
    }

    /// Snapshot file contents without the generated header.
    pub fn db_body(&self) -> String {
        let text = std::fs::read_to_string(self.db_path()).expect("read snapshot");
        text.lines()
            .filter(|l| !l.starts_with('#') && !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn write_config(dir: &TempDir, db_settings: &str, extra: &str) -> Config {
    let path = dir.path().join("config.toml");
    let content = format!(
        r#"
[server]
name = "{SERVER_NAME}"
config_dir = '{}'

[permchanneldb]
filename = "{DB_FILE}"
{db_settings}

{extra}
"#,
        dir.path().display()
    );
    std::fs::write(&path, content).expect("write config");
    Config::load(&path).expect("load config")
}

pub fn oper(nick: &str) -> ModeSource {
    ModeSource::User {
        nick: nick.to_string(),
        oper: true,
    }
}

pub fn user(nick: &str) -> ModeSource {
    ModeSource::User {
        nick: nick.to_string(),
        oper: false,
    }
}
