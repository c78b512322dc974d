use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// A function name with its positional and keyword arguments
///
/// Arguments are stored as JSON values, so anything `Serialize` can be passed and read back as
/// any compatible `Deserialize` type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallPayload {
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl CallPayload {
    pub fn new(function: impl Into<String>) -> CallPayload {
        CallPayload { function: function.into(), args: Vec::new(), kwargs: Map::new() }
    }

    /// Append a positional argument
    pub fn with_arg<A: Serialize>(mut self, value: A) -> Result<CallPayload> {
        self.args.push(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Set a keyword argument
    pub fn with_kwarg<A: Serialize>(mut self, key: impl Into<String>, value: A) -> Result<CallPayload> {
        self.kwargs.insert(key.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Positional argument `index` as a `T`
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self.args.get(index).ok_or_else(|| {
            <serde_json::Error as serde::de::Error>::custom(format!(
                "{} has no positional argument {}",
                self.function, index
            ))
        })?;
        Ok(T::deserialize(value)?)
    }

    /// Keyword argument `key` as a `T`, `None` if it wasn't passed
    pub fn kwarg<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kwargs.get(key) {
            Some(value) => Ok(Some(T::deserialize(value)?)),
            None => Ok(None),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        info!("Writing call payload for {} to {}", self.function, path.display());
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<CallPayload> {
        info!("Loading {}", path.display());
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
