//! Isolated sign language recognition (ISLR) shards.
//!
//! A shard is a single tar file in webdataset form: for every sample one
//! `<id>.pose.<region>.npy` entry per region and a `<id>.label.idx` entry
//! holding the class index as ASCII digits.

use crate::archive::{ArchiveWriter, Blob};
use crate::config::OutputLayout;
use crate::error::CoreResult;
use crate::npy::NpyArray;
use crate::sample::Sample;

use log::info;
use std::path::Path;

/// A sample together with its class index.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub sample: Sample,
    pub label: u32,
}

/// Entry name of a sample's label.
pub fn label_entry(sample_id: &str) -> String {
    format!("{sample_id}.label.idx")
}

/// Writes labeled samples into one shard at `dest`, returning the bytes written.
pub fn write_islr_shard<I>(samples: I, dest: &Path) -> CoreResult<u64>
where
    I: IntoIterator<Item = LabeledSample>,
{
    let mut writer = ArchiveWriter::new();
    let mut count = 0usize;

    for LabeledSample { sample, label } in samples {
        for (&region, tensor) in &sample.regions {
            let name = OutputLayout::Webdataset.array_entry(region, &sample.id);
            writer.add(&name, &Blob::Array(NpyArray::from_array(tensor)))?;
        }
        writer.add(
            &label_entry(&sample.id),
            &Blob::Bytes(label.to_string().into_bytes()),
        )?;
        count += 1;
    }

    let bytes = writer.flush_to(dest)?;
    info!("ISLR shard {} written ({count} samples)", dest.display());
    Ok(bytes)
}
