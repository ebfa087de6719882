//! Process-wide registry of preprocessed scripts.
//!
//! Commands are discovered once from the crate's `commands/` tree, expanded
//! by the loader and wrapped as [`redis::Script`] values. `redis::Script`
//! derives the SHA-1 identity from the expanded bytes and invokes by
//! `EVALSHA`, reloading transparently on a `NOSCRIPT` reply.

use glob::glob;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::path::Path;

use super::loader::ScriptLoader;
use crate::error::{QueueError, ScriptLoaderError};

#[derive(Debug)]
pub struct RegisteredScript {
    pub name: String,
    pub num_keys: Option<usize>,
    pub script: redis::Script,
}

impl RegisteredScript {
    pub fn sha(&self) -> &str {
        self.script.get_hash()
    }
}

pub struct ScriptRegistry {
    commands: HashMap<String, RegisteredScript>,
}

impl ScriptRegistry {
    /// Expands every `*.lua` command under `dir` (fragments live in
    /// `dir/includes` and are not commands themselves).
    pub fn from_dir(dir: &Path) -> Result<Self, ScriptLoaderError> {
        let loader = ScriptLoader::with_root(dir);
        let pattern = format!("{}/*.lua", dir.display());
        let mut commands = HashMap::new();

        for entry in
            glob(&pattern).map_err(|err| ScriptLoaderError::IoError(err.to_string()))?
        {
            let path = entry.map_err(|err| ScriptLoaderError::IoError(err.to_string()))?;
            let command = loader.load_command(&path)?;
            commands.insert(
                command.name.clone(),
                RegisteredScript {
                    name: command.name,
                    num_keys: command.num_keys,
                    script: redis::Script::new(&command.lua),
                },
            );
        }

        Ok(ScriptRegistry { commands })
    }

    pub fn get(&self, name: &str) -> Result<&RegisteredScript, QueueError> {
        self.commands
            .get(name)
            .ok_or_else(|| QueueError::UnknownScript(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(|name| name.as_str())
    }
}

lazy_static! {
    pub static ref SCRIPTS: ScriptRegistry = {
        let dir = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/src/scripts/commands"));
        match ScriptRegistry::from_dir(dir) {
            Ok(registry) => registry,
            Err(e) => panic!("Error: {:?}", e),
        }
    };
}
