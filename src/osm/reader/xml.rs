// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::io;
use std::str::{from_utf8, FromStr};

use quick_xml::events::{BytesStart, Event};

use super::model;
use crate::osm::Error;

/// Parser is a trait for objects which can parse XML.
///
/// This trait only exists to fix the mismatch of
/// [quick_xml::Reader::read_event] when working on buffered data
/// and [quick_xml::Reader::read_event_into] when working on IO.
pub(super) trait Parser {
    fn read_event<'a>(&'a mut self) -> quick_xml::Result<Event<'a>>;
}

/// IoParser implements [Parser] over an [std::io::BufRead].
pub(super) struct IoParser<R: io::BufRead>(quick_xml::Reader<R>, Vec<u8>);

impl<R: io::BufRead> IoParser<R> {
    #[inline]
    fn new(reader: R) -> Self {
        Self(quick_xml::Reader::from_reader(reader), Vec::default())
    }
}

impl<R: io::BufRead> Parser for IoParser<R> {
    #[inline]
    fn read_event<'a>(&'a mut self) -> quick_xml::Result<Event<'a>> {
        self.1.clear();
        self.0.read_event_into(&mut self.1)
    }
}

/// BufParser implements [Parser] over a slice of bytes (`&[u8]`).
pub(super) struct BufParser<'a>(quick_xml::Reader<&'a [u8]>);

impl<'a> BufParser<'a> {
    #[inline]
    fn new(data: &'a [u8]) -> Self {
        Self(quick_xml::Reader::from_reader(data))
    }
}

impl<'a> Parser for BufParser<'a> {
    #[inline]
    fn read_event<'b>(&'b mut self) -> quick_xml::Result<Event<'b>> {
        self.0.read_event()
    }
}

/// Reader reads top-level osm [Elements](model::Element) from an XML file.
pub(super) struct Reader<P: Parser> {
    parser: P,
    eof: bool,
}

impl<P: Parser> Reader<P> {
    #[inline]
    fn new(parser: P) -> Self {
        Self { parser, eof: false }
    }
}

impl<P: Parser> Iterator for Reader<P> {
    type Item = Result<model::Element, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut e: Option<model::Element> = None;

        while !self.eof {
            let event = match self.parser.read_event() {
                Ok(event) => event,
                Err(err) => {
                    self.eof = true;
                    return Some(Err(err.into()));
                }
            };

            match event {
                Event::Empty(start) => match start.local_name().as_ref() {
                    b"node" => {
                        return Some(parse_node(&start).map(model::Element::Node));
                    }
                    b"way" => {
                        return Some(parse_way(&start).map(model::Element::Way));
                    }
                    b"tag" => {
                        if let Some(tags) = element_tags(&mut e) {
                            if let Some((k, v)) = parse_tag(&start) {
                                tags.insert(k, v);
                            }
                        }
                    }
                    b"nd" => {
                        if let Some(nodes) = element_nodes(&mut e) {
                            match parse_nd(&start) {
                                Ok(ref_) => nodes.push(ref_),
                                Err(err) => return Some(Err(err)),
                            }
                        }
                    }
                    _ => {}
                },

                Event::Start(start) => match start.local_name().as_ref() {
                    b"node" => match parse_node(&start) {
                        Ok(n) => e = Some(model::Element::Node(n)),
                        Err(err) => return Some(Err(err)),
                    },
                    b"way" => match parse_way(&start) {
                        Ok(w) => e = Some(model::Element::Way(w)),
                        Err(err) => return Some(Err(err)),
                    },
                    // Children of relations are dropped together with the relation
                    b"relation" => e = None,
                    _ => {}
                },

                Event::End(end) => match end.local_name().as_ref() {
                    b"node" | b"way" => {
                        if let Some(e) = e.take() {
                            return Some(Ok(e));
                        }
                    }
                    _ => {}
                },

                Event::Eof => {
                    self.eof = true;
                }

                _ => {}
            }
        }

        return e.map(Ok);
    }
}

impl<'a> Reader<BufParser<'a>> {
    #[inline]
    pub(super) fn from_buffer(data: &'a [u8]) -> Self {
        Self::new(BufParser::new(data))
    }
}

impl<R: io::BufRead> Reader<IoParser<R>> {
    #[inline]
    pub(super) fn from_io(reader: R) -> Self {
        Self::new(IoParser::new(reader))
    }
}

fn parse_value<T: FromStr>(value: &[u8]) -> Option<T> {
    from_utf8(value).ok()?.parse().ok()
}

fn parse_node(start: &BytesStart<'_>) -> Result<model::Node, Error> {
    let mut id: Option<i64> = None;
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr in start.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"id" => id = parse_value(&attr.value),
            b"lat" => lat = parse_value(&attr.value),
            b"lon" => lon = parse_value(&attr.value),
            _ => {}
        }
    }

    match (id, lat, lon) {
        (Some(id), Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Ok(model::Node {
            id,
            lat,
            lon,
            tags: HashMap::default(),
        }),
        (Some(id), _, _) => Err(Error::Parse {
            element: "node",
            reason: format!("node {} has no valid lat/lon", id),
        }),
        _ => Err(Error::Parse {
            element: "node",
            reason: "missing or invalid id".to_string(),
        }),
    }
}

fn parse_way(start: &BytesStart<'_>) -> Result<model::Way, Error> {
    let mut id: Option<i64> = None;

    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"id" {
            id = parse_value(&attr.value);
        }
    }

    match id {
        Some(id) => Ok(model::Way {
            id,
            nodes: Vec::default(),
            tags: HashMap::default(),
        }),
        None => Err(Error::Parse {
            element: "way",
            reason: "missing or invalid id".to_string(),
        }),
    }
}

fn parse_tag(start: &BytesStart<'_>) -> Option<(String, String)> {
    let mut k = None;
    let mut v = None;

    for attr in start.attributes() {
        let attr = attr.ok()?;
        match attr.key.as_ref() {
            b"k" => k = from_utf8(&attr.value).ok().map(|s| s.to_string()),
            b"v" => v = from_utf8(&attr.value).ok().map(|s| s.to_string()),
            _ => {}
        }
    }

    k.map(|k| (k, v.unwrap_or_default()))
}

fn parse_nd(start: &BytesStart<'_>) -> Result<i64, Error> {
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"ref" {
            return parse_value(&attr.value).ok_or_else(|| Error::Parse {
                element: "nd",
                reason: format!("invalid ref {:?}", String::from_utf8_lossy(&attr.value)),
            });
        }
    }

    Err(Error::Parse {
        element: "nd",
        reason: "missing ref".to_string(),
    })
}

fn element_tags<'a>(e: &'a mut Option<model::Element>) -> Option<&'a mut HashMap<String, String>> {
    match e {
        None => None,
        Some(model::Element::Node(ref mut n)) => Some(&mut n.tags),
        Some(model::Element::Way(ref mut w)) => Some(&mut w.tags),
    }
}

fn element_nodes<'a>(e: &'a mut Option<model::Element>) -> Option<&'a mut Vec<i64>> {
    match e {
        Some(model::Element::Way(ref mut w)) => Some(&mut w.nodes),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::model::{Element, Node, Way};
    use super::*;

    macro_rules! tags {
        {} => { HashMap::default() };
        {$( $k:literal : $v:literal ),+} => {
            HashMap::from_iter([ $( ($k.to_string(), $v.to_string()) ),+ ])
        };
    }

    const TOWN_XML: &[u8] = include_bytes!("test_fixtures/town.osm");

    fn collect_all<I: Iterator<Item = Result<Element, Error>>>(
        elements: I,
    ) -> Result<(Vec<Node>, Vec<Way>), Error> {
        let mut nodes = Vec::default();
        let mut ways = Vec::default();

        for e in elements {
            match e? {
                Element::Node(n) => nodes.push(n),
                Element::Way(w) => ways.push(w),
            }
        }

        Ok((nodes, ways))
    }

    fn check_town<I: Iterator<Item = Result<Element, Error>>>(elements: I) -> Result<(), Error> {
        let (nodes, ways) = collect_all(elements)?;

        assert_eq!(nodes.len(), 40);
        assert_eq!(
            nodes[0],
            Node {
                id: 1,
                lat: 39.002,
                lon: -84.008,
                tags: tags! {},
            }
        );
        assert_eq!(nodes[8].tags, tags! {"highway": "traffic_signals"});

        let entrance = nodes.iter().find(|n| n.id == 30).unwrap();
        assert_eq!(entrance.tags, tags! {"entrance": "yes"});

        assert_eq!(ways.len(), 14);
        assert_eq!(
            ways[1],
            Way {
                id: 101,
                nodes: vec![3, 4, 5],
                tags: tags! {"highway": "residential", "name": "Oak Street", "oneway": "yes"},
            }
        );
        assert_eq!(
            ways[6],
            Way {
                id: 200,
                nodes: vec![20, 21, 22, 23, 20],
                tags: tags! {"building": "house", "building:levels": "2"},
            }
        );

        Ok(())
    }

    #[test]
    fn parse_from_buf() -> Result<(), Error> {
        check_town(Reader::from_buffer(TOWN_XML))
    }

    #[test]
    fn parse_from_io() -> Result<(), Error> {
        check_town(Reader::from_io(io::Cursor::new(TOWN_XML)))
    }

    #[test]
    fn nd_without_ref_is_an_error() {
        const DATA: &[u8] = b"<osm><node id='1' lat='0' lon='0'/>\
            <way id='2'><nd ref='1'/><nd nope='1'/></way></osm>";

        let result = collect_all(Reader::from_buffer(DATA));
        assert!(matches!(result, Err(Error::Parse { element: "nd", .. })));
    }

    #[test]
    fn node_without_position_is_an_error() {
        const DATA: &[u8] = b"<osm><node id='1' lat='0'/></osm>";

        let result = collect_all(Reader::from_buffer(DATA));
        assert!(matches!(result, Err(Error::Parse { element: "node", .. })));
    }

    #[test]
    fn relations_are_skipped() -> Result<(), Error> {
        const DATA: &[u8] = b"<osm><relation id='1'><member type='way' ref='2' role=''/>\
            <tag k='type' v='route'/></relation><node id='3' lat='1' lon='2'/></osm>";

        let (nodes, ways) = collect_all(Reader::from_buffer(DATA))?;
        assert_eq!(nodes.len(), 1);
        assert!(ways.is_empty());
        Ok(())
    }
}
