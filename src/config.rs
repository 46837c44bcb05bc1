use crate::bus::Bus;
use crate::client::{Op, Script};
use crate::decoder::{self, AddressMap};
use crate::memory::{Address, Byte};
use crate::simulation::SimulationConfig;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Parse(toml::de::Error),
    AddressMap(decoder::Error),
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Self::Parse(error)
    }
}

impl From<decoder::Error> for Error {
    fn from(error: decoder::Error) -> Self {
        Self::AddressMap(error)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "unable to read scenario: {}", err),
            Error::Parse(err) => write!(f, "invalid scenario: {}", err),
            Error::AddressMap(err) => write!(f, "invalid address map: {}", err),
        }
    }
}

impl std::error::Error for Error {}

/// Bytes copied onto the bus before the client starts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Image {
    pub address: Address,
    pub bytes: Vec<Byte>,
}

/// Everything needed to run a client program: where the devices live, how the driver schedules
/// the tasks, and the program itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub address_map: AddressMap,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub image: Vec<Image>,
    #[serde(default)]
    pub program: Vec<Op>,
}

impl Scenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    /// Builds a bus for this scenario's address map with every image already loaded.
    pub fn build_bus(&self) -> Result<Bus, Error> {
        let mut bus = Bus::new(self.address_map)?;
        for image in &self.image {
            let loaded = bus.load(image.address, &image.bytes);
            if loaded < image.bytes.len() {
                log::warn!(
                    "image at 0x{:04x} truncated to {} of {} bytes",
                    image.address,
                    loaded,
                    image.bytes.len()
                );
            }
        }
        Ok(bus)
    }

    pub fn script(&self) -> Script {
        Script::new(&self.program, &self.address_map)
    }
}

impl FromStr for Scenario {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }
}
