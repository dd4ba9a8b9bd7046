//! Training-data collection
//!
//! Sampled camera frames and telemetry are buffered in memory and flushed in
//! batches into an embedded key-value store, one store per flush episode.
//! Everything here runs inline on the step that triggers it.
//!
//! # Store layout
//!
//! Each flush creates a directory named
//! `rid_<route_id>_<month>_<day>_<hour>_<minute>_<second>` (all fields two
//! digit zero-padded) under the configured output directory. Inside, the
//! store holds:
//!
//! - `len`: decimal string count of records in this store
//! - `info_<i>`: three little-endian f32 values - speed (m/s), at-junction
//!   flag (0/1), weather-change indicator - for each zero-padded 5-digit
//!   index `i`
//! - `rgbs_<i>`: raw `H x W x 3` byte image, row-major
//! - `sems_<i>`: raw `H x W` byte image of semantic class tags, row-major

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{Datelike, Local, Timelike};
use log::info;
use ndarray::{s, Array2, Array3, Axis, Dimension};
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Store key under which the record count is written.
pub const STORE_LEN_KEY: &str = "len";

/// Channel of the semantic camera image carrying the class tag.
const SEM_TAG_CHANNEL: usize = 2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One sampled telemetry tuple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    /// Ego vehicle speed.
    ///
    /// Units: meters/second
    pub speed_ms: f32,

    /// True if the ego vehicle is currently inside a junction.
    pub at_junction: bool,

    /// Weather-change indicator echoed from the configuration.
    pub weather_change: f32,
}

/// Buffer of sampled frames awaiting a flush.
///
/// The three sequences are always the same length: a sample appends to all
/// of them or to none, and a flush clears all of them together.
#[derive(Default)]
pub struct FrameBuffer {
    rgbs: Vec<Array3<u8>>,
    sems: Vec<Array2<u8>>,
    info: Vec<Telemetry>,
}

/// Writes buffered frames out to per-episode stores.
#[derive(Debug, Default)]
pub struct DatasetWriter {
    /// Directory under which flush-episode stores are created
    data_save: PathBuf,

    /// Route identifier used in store directory names
    route_id: u32,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors raised during data collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Camera frame has {0} channels, expected at least 3")]
    TooFewChannels(usize),

    #[error("Cannot create the store directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error("Cannot encode telemetry: {0}")]
    EncodeError(std::io::Error),

    #[error("Store error: {0}")]
    StoreError(#[from] sled::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Telemetry {
    /// Encode the tuple as three little-endian f32 values.
    pub fn encode(&self) -> Result<Vec<u8>, CollectorError> {
        let mut bytes = Vec::with_capacity(12);
        bytes
            .write_f32::<LittleEndian>(self.speed_ms)
            .map_err(CollectorError::EncodeError)?;
        bytes
            .write_f32::<LittleEndian>(if self.at_junction { 1.0 } else { 0.0 })
            .map_err(CollectorError::EncodeError)?;
        bytes
            .write_f32::<LittleEndian>(self.weather_change)
            .map_err(CollectorError::EncodeError)?;

        Ok(bytes)
    }
}

impl FrameBuffer {
    /// Append one sample to all three sequences.
    ///
    /// The RGB frame is truncated to its first three channels and the
    /// semantic frame reduced to its tag channel. Both input images must be
    /// `H x W x C` with `C >= 3`; anything narrower is rejected before any
    /// of the sequences is touched.
    pub fn push(
        &mut self,
        rgb: &Array3<u8>,
        sem: &Array3<u8>,
        info: Telemetry,
    ) -> Result<(), CollectorError> {
        let rgb_channels = rgb.len_of(Axis(2));
        if rgb_channels < 3 {
            return Err(CollectorError::TooFewChannels(rgb_channels));
        }
        let sem_channels = sem.len_of(Axis(2));
        if sem_channels <= SEM_TAG_CHANNEL {
            return Err(CollectorError::TooFewChannels(sem_channels));
        }

        self.rgbs.push(rgb.slice(s![.., .., ..3]).to_owned());
        self.sems.push(sem.index_axis(Axis(2), SEM_TAG_CHANNEL).to_owned());
        self.info.push(info);

        Ok(())
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.info.len()
    }

    /// True if no samples are buffered.
    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }

    /// Drop all buffered samples.
    pub fn clear(&mut self) {
        self.rgbs.clear();
        self.sems.clear();
        self.info.clear();
    }
}

impl DatasetWriter {
    /// Create a writer placing stores under `data_save`.
    pub fn new(data_save: PathBuf, route_id: u32) -> Self {
        DatasetWriter {
            data_save,
            route_id,
        }
    }

    /// Write all buffered samples into a fresh store and clear the buffer.
    ///
    /// Writes one `len` marker plus three records per buffered sample. The
    /// buffer is only cleared once the store has been fully written and
    /// flushed to disk. Returns the path of the store that was written.
    pub fn flush(&self, buffer: &mut FrameBuffer) -> Result<PathBuf, CollectorError> {
        let now = Local::now();
        let store_path = self.data_save.join(format!(
            "rid_{:02}_{:02}_{:02}_{:02}_{:02}_{:02}",
            self.route_id,
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second()
        ));

        if !store_path.exists() {
            std::fs::create_dir_all(&store_path).map_err(CollectorError::CannotCreateDir)?;
            info!("======> Saving to {:?}", store_path);
        }

        let db = sled::open(&store_path)?;
        let count = buffer.info.len();

        db.insert(STORE_LEN_KEY, count.to_string().as_bytes())?;

        for i in 0..count {
            db.insert(format!("info_{:05}", i).as_bytes(), buffer.info[i].encode()?)?;
            db.insert(
                format!("rgbs_{:05}", i).as_bytes(),
                frame_bytes(&buffer.rgbs[i]),
            )?;
            db.insert(
                format!("sems_{:05}", i).as_bytes(),
                frame_bytes(&buffer.sems[i]),
            )?;
        }

        db.flush()?;
        buffer.clear();

        Ok(store_path)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Copy an image array out as raw row-major bytes.
fn frame_bytes<D: Dimension>(frame: &ndarray::Array<u8, D>) -> Vec<u8> {
    frame.iter().copied().collect()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
