//! Bulk import of the static city list into the local store.
//!
//! Accepts either a JSON array (the shape of OpenWeather's `city.list.json`)
//! or newline-delimited JSON, one record per line:
//!
//! ```json
//! {"id": 1275004, "name": "Kolkata", "country": "IN", "coord": {"lat": 22.5697, "lon": 88.3697}}
//! ```
//!
//! Records are written in fixed-size batches, each batch in its own transaction.

use anyhow::{Context, Result, ensure};
use serde::{
    Deserialize, Deserializer as _,
    de::{Error as _, SeqAccess, Visitor},
};
use std::{
    fmt,
    io::{BufRead, BufReader, Read},
};
use tracing::info;

use crate::{City, Coordinates, store::Store};

pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
struct CityEntry {
    id: i64,
    name: String,
    #[serde(default)]
    country: String,
    coord: Coordinates,
}

impl From<CityEntry> for City {
    fn from(entry: CityEntry) -> Self {
        City {
            id: entry.id,
            name: entry.name,
            country: entry.country,
            lat: entry.coord.lat,
            lon: entry.coord.lon,
        }
    }
}

/// Import every record from `reader`. Returns the number of records read.
pub fn import_cities<R: Read>(store: &Store, reader: R, batch_size: usize) -> Result<usize> {
    ensure!(batch_size > 0, "batch size must be at least 1");

    let mut reader = BufReader::new(reader);
    let count = if starts_with_array(&mut reader)? {
        import_array(store, reader, batch_size)?
    } else {
        import_lines(store, reader, batch_size)?
    };

    info!(count, "city import finished");
    Ok(count)
}

fn starts_with_array<R: BufRead>(reader: &mut R) -> Result<bool> {
    loop {
        let buf = reader.fill_buf().context("Failed to read city file")?;
        if buf.is_empty() {
            return Ok(false);
        }
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(idx) => {
                let is_array = buf[idx] == b'[';
                reader.consume(idx);
                return Ok(is_array);
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

fn import_array<R: Read>(store: &Store, reader: R, batch_size: usize) -> Result<usize> {
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    let count = (&mut deserializer)
        .deserialize_seq(BatchWriter { store, batch_size })
        .context("Failed to import city array")?;
    deserializer.end().context("Trailing data after city array")?;
    Ok(count)
}

fn import_lines<R: Read>(store: &Store, reader: R, batch_size: usize) -> Result<usize> {
    let stream = serde_json::Deserializer::from_reader(reader).into_iter::<CityEntry>();
    let mut batch: Vec<City> = Vec::with_capacity(batch_size);
    let mut count = 0;

    for entry in stream {
        let entry = entry.with_context(|| format!("Decode error at record {count}"))?;
        batch.push(entry.into());
        count += 1;

        if batch.len() >= batch_size {
            store.insert_cities(&batch).context("Failed to insert city batch")?;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        store.insert_cities(&batch).context("Failed to insert city batch")?;
    }
    Ok(count)
}

/// Streams array elements straight into batched inserts without collecting
/// the whole file.
struct BatchWriter<'a> {
    store: &'a Store,
    batch_size: usize,
}

impl<'de> Visitor<'de> for BatchWriter<'_> {
    type Value = usize;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of city records")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<usize, A::Error> {
        let mut batch: Vec<City> = Vec::with_capacity(self.batch_size);
        let mut count = 0;

        loop {
            let entry = seq
                .next_element::<CityEntry>()
                .map_err(|e| A::Error::custom(format!("Decode error at record {count}: {e}")))?;
            let Some(entry) = entry else { break };
            batch.push(entry.into());
            count += 1;

            if batch.len() >= self.batch_size {
                self.store.insert_cities(&batch).map_err(A::Error::custom)?;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.store.insert_cities(&batch).map_err(A::Error::custom)?;
        }
        Ok(count)
    }
}
