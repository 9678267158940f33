// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;

use log::info;

use super::{Error, Options};

pub mod model;
mod xml;

/// Format of the input OSM file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Unknown format - guess the format based on the content
    Unknown,

    /// Force uncompressed [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    Xml,

    /// Force [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    /// with [gzip](https://en.wikipedia.org/wiki/Gzip) compression
    XmlGz,

    /// Force [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    /// with [bzip2](https://en.wikipedia.org/wiki/Bzip2) compression
    XmlBz2,
}

impl FileFormat {
    /// Guesses the format of a stream by looking at its first bytes, without consuming them.
    fn detect<R: BufRead>(reader: &mut R) -> io::Result<Self> {
        let head = reader.fill_buf()?;
        if head.starts_with(&[0x1f, 0x8b]) {
            Ok(Self::XmlGz)
        } else if head.starts_with(b"BZh") {
            Ok(Self::XmlBz2)
        } else {
            Ok(Self::Xml)
        }
    }
}

/// In-memory OSM document: all top-level nodes and ways, in document order.
///
/// Ingestion phases partition [Document::elements] between worker threads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    elements: Vec<model::Element>,
}

impl Document {
    pub fn new(elements: Vec<model::Element>) -> Self {
        Self { elements }
    }

    #[inline]
    pub fn elements(&self) -> &[model::Element] {
        &self.elements
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn collect<I: Iterator<Item = Result<model::Element, Error>>>(elements: I) -> Result<Self, Error> {
        let doc = Self::new(elements.collect::<Result<Vec<_>, _>>()?);
        info!("Loaded {} OSM elements", doc.len());
        Ok(doc)
    }

    /// Parse an OSM document from a reader, as per [Options::file_format].
    ///
    /// The provided stream will be automatically wrapped in a buffered reader when needed.
    pub fn from_io<R: io::Read>(options: &Options, reader: R) -> Result<Self, Error> {
        let mut b = io::BufReader::new(reader);
        let format = match options.file_format {
            FileFormat::Unknown => FileFormat::detect(&mut b)?,
            f => f,
        };

        match format {
            FileFormat::Unknown | FileFormat::Xml => Self::collect(xml::Reader::from_io(b)),

            FileFormat::XmlGz => {
                let d = flate2::read::MultiGzDecoder::new(b);
                Self::collect(xml::Reader::from_io(io::BufReader::new(d)))
            }

            FileFormat::XmlBz2 => {
                let d = bzip2::read::MultiBzDecoder::new(b);
                Self::collect(xml::Reader::from_io(io::BufReader::new(d)))
            }
        }
    }

    /// Parse an OSM document from a file at the provided path.
    pub fn from_file<P: AsRef<Path>>(options: &Options, path: P) -> Result<Self, Error> {
        let f = File::open(path)?;
        Self::from_io(options, f)
    }

    /// Parse an OSM document from a static buffer.
    pub fn from_buffer(options: &Options, data: &[u8]) -> Result<Self, Error> {
        if options.file_format == FileFormat::Xml {
            // Fast path is available for in-memory XML data
            Self::collect(xml::Reader::from_buffer(data))
        } else {
            // Wrap the buffer in a cursor and use the IO path
            Self::from_io(options, io::Cursor::new(data))
        }
    }
}
