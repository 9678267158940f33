// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{self, BufRead};
use std::ops::RangeInclusive;
use std::path::Path;

use log::info;

use crate::osm::Error;
use crate::PopulationRing;

/// Moves the target population of one ring onto another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remap {
    /// Line of the adjustments file with this directive.
    pub line: usize,

    /// Index of the ring whose population is moved.
    pub src: i64,

    /// Index of the receiving ring, or -1 to discard the population.
    pub dest: i64,
}

/// Manual corrections to the ingested data, read from an adjustments file.
///
/// ```text
/// # comments and blank lines are ignored
/// ignore 123456
/// ignore 1000:1999
/// remap 4 7
/// remap 5 -1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Adjustments {
    ignored: Vec<RangeInclusive<i64>>,
    remaps: Vec<Remap>,
}

impl Adjustments {
    /// Parses the contents of an adjustments file.
    pub fn parse(text: &str) -> Result<Self, Error> {
        Self::from_reader(text.as_bytes())
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut adjustments = Self::default();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = i + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            match fields.next() {
                Some("ignore") => {
                    let arg = expect_field(fields.next(), line_no, "ignore needs a building id or range")?;
                    adjustments.ignored.push(parse_ignored(arg, line_no)?);
                }

                Some("remap") => {
                    let src = expect_field(fields.next(), line_no, "remap needs a source ring")?;
                    let dest = expect_field(fields.next(), line_no, "remap needs a destination ring")?;
                    adjustments.remaps.push(Remap {
                        line: line_no,
                        src: parse_int(src, line_no)?,
                        dest: parse_int(dest, line_no)?,
                    });
                }

                Some(other) => {
                    return Err(Error::Adjustment {
                        line: line_no,
                        reason: format!("unknown directive {:?}", other),
                    })
                }

                None => {}
            }

            if let Some(extra) = fields.next() {
                return Err(Error::Adjustment {
                    line: line_no,
                    reason: format!("unexpected trailing field {:?}", extra),
                });
            }
        }

        Ok(adjustments)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let f = File::open(path)?;
        Self::from_reader(io::BufReader::new(f))
    }

    /// Checks whether the building with the provided id should be left out of the model.
    pub fn is_ignored(&self, building_id: i64) -> bool {
        self.ignored.iter().any(|r| r.contains(&building_id))
    }

    #[inline]
    pub fn remaps(&self) -> &[Remap] {
        &self.remaps
    }

    /// Applies all `remap` directives, in file order, to the target populations of rings.
    pub fn apply_remaps(&self, rings: &mut [PopulationRing]) -> Result<(), Error> {
        let n = rings.len() as i64;

        for remap in &self.remaps {
            let src_valid = remap.src >= 0 && remap.src < n;
            let dest_valid = remap.dest >= -1 && remap.dest < n && remap.dest != remap.src;
            if !src_valid || !dest_valid {
                return Err(Error::InvalidRemap {
                    line: remap.line,
                    src: remap.src,
                    dest: remap.dest,
                    rings: rings.len(),
                });
            }

            let src = remap.src as usize;
            let moved = rings[src].population;
            if remap.dest >= 0 {
                rings[remap.dest as usize].population += moved;
                info!("Moved population {} from ring {} to ring {}", moved, src, remap.dest);
            } else {
                info!("Discarded population {} of ring {}", moved, src);
            }
            rings[src].population = 0;
        }

        Ok(())
    }
}

fn expect_field<'a>(field: Option<&'a str>, line: usize, reason: &str) -> Result<&'a str, Error> {
    field.ok_or_else(|| Error::Adjustment {
        line,
        reason: reason.to_string(),
    })
}

fn parse_int(s: &str, line: usize) -> Result<i64, Error> {
    s.parse().map_err(|_| Error::Adjustment {
        line,
        reason: format!("invalid number {:?}", s),
    })
}

fn parse_ignored(arg: &str, line: usize) -> Result<RangeInclusive<i64>, Error> {
    match arg.split_once(':') {
        Some((start, end)) => {
            let start = parse_int(start, line)?;
            let end = parse_int(end, line)?;
            if start > end {
                return Err(Error::Adjustment {
                    line,
                    reason: format!("empty range {}:{}", start, end),
                });
            }
            Ok(start..=end)
        }
        None => {
            let id = parse_int(arg, line)?;
            Ok(id..=id)
        }
    }
}
