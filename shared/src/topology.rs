use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

/// Geographic position `[x, y]`.
pub type Point = [f64; 2];

/// Closed ring of positions. The closing point may or may not repeat the first.
pub type Ring = Vec<Point>;

/// Signed arc reference. `i >= 0` walks arc `i` forward, `i < 0` walks arc `!i` backward.
pub type ArcIndex = i64;

/// Axis-aligned rectangle in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        [
            self.min_x + self.width() / 2.0,
            self.min_y + self.height() / 2.0,
        ]
    }

    /// Smallest box containing every point, or `None` for an empty input.
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        points.into_iter().fold(None, |acc, &[x, y]| {
            Some(match acc {
                None => Self::new(x, y, x, y),
                Some(b) => Self::new(b.min_x.min(x), b.min_y.min(y), b.max_x.max(x), b.max_y.max(y)),
            })
        })
    }
}

/// Boundary of one region, expressed as arc references.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionGeometry {
    /// Rings of a single polygon: outer boundary first, then holes.
    Polygon(Vec<Vec<ArcIndex>>),
    MultiPolygon(Vec<Vec<Vec<ArcIndex>>>),
}

impl RegionGeometry {
    /// Every ring of every sub-polygon, in source order.
    pub fn rings(&self) -> Box<dyn Iterator<Item = &[ArcIndex]> + '_> {
        match self {
            Self::Polygon(rings) => Box::new(rings.iter().map(Vec::as_slice)),
            Self::MultiPolygon(polygons) => {
                Box::new(polygons.iter().flatten().map(Vec::as_slice))
            }
        }
    }
}

/// Where a geometry's region key comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeySource {
    /// The geometry's `id` member.
    #[default]
    Id,
    /// A named entry of the geometry's `properties`.
    Property(String),
}

#[derive(Debug)]
pub enum TopologyError {
    Parse(serde_json::Error),
    /// The document declares a `type` other than `Topology`.
    NotATopology(String),
    /// A position with fewer than two coordinates.
    BadPosition { arc: usize },
    /// A quantization transform with a zero or non-finite factor.
    BadTransform,
    ArcOutOfRange {
        region: String,
        index: ArcIndex,
        arcs: usize,
    },
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "topology parse error: {e}"),
            Self::NotATopology(kind) => write!(f, "expected a Topology document, found {kind:?}"),
            Self::BadPosition { arc } => write!(f, "arc {arc} has a position with fewer than two coordinates"),
            Self::BadTransform => write!(f, "transform scale must be finite and non-zero"),
            Self::ArcOutOfRange {
                region,
                index,
                arcs,
            } => write!(
                f,
                "region {region:?} references arc {index}, but only {arcs} arcs exist"
            ),
        }
    }
}

impl std::error::Error for TopologyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TopologyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

/// Shared-arc topology: arcs in geographic coordinates plus per-region arc references.
///
/// Construction validates every arc reference, so decoding never fails.
#[derive(Debug, Clone)]
pub struct TopologyDocument {
    bounding_box: Option<BoundingBox>,
    arcs: Vec<Vec<Point>>,
    regions: HashMap<String, RegionGeometry>,
}

impl TopologyDocument {
    /// Build a document from decoded arcs. A missing bounding box is derived from the arcs.
    pub fn new(
        bounding_box: Option<BoundingBox>,
        arcs: Vec<Vec<Point>>,
        regions: HashMap<String, RegionGeometry>,
    ) -> Result<Self, TopologyError> {
        for (key, geometry) in &regions {
            for ring in geometry.rings() {
                for &index in ring {
                    if arc_slot(index).is_none_or(|slot| slot >= arcs.len()) {
                        return Err(TopologyError::ArcOutOfRange {
                            region: key.clone(),
                            index,
                            arcs: arcs.len(),
                        });
                    }
                }
            }
        }

        let bounding_box = bounding_box.or_else(|| BoundingBox::enclosing(arcs.iter().flatten()));
        Ok(Self {
            bounding_box,
            arcs,
            regions,
        })
    }

    /// Parse a TopoJSON document.
    ///
    /// Quantized documents (with a `transform`) have their delta-encoded arcs
    /// expanded to absolute coordinates here. Every Polygon and MultiPolygon in
    /// `objects` becomes a region keyed by `keys`; a top-level object without a
    /// key falls back to its object name.
    pub fn from_json(text: &str, keys: &KeySource) -> Result<Self, TopologyError> {
        let raw: RawTopology = serde_json::from_str(text)?;
        if let Some(kind) = raw.kind.as_deref()
            && kind != "Topology"
        {
            return Err(TopologyError::NotATopology(kind.to_string()));
        }

        let transform = match raw.transform {
            Some(t) if !t.is_valid() => return Err(TopologyError::BadTransform),
            other => other,
        };

        let arcs = raw
            .arcs
            .iter()
            .enumerate()
            .map(|(arc, positions)| decode_arc(arc, positions, transform.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut regions = HashMap::new();
        for (name, object) in &raw.objects {
            collect_regions(object, Some(name), keys, &mut regions);
        }

        let bounding_box = match raw.bbox.as_deref() {
            Some(&[min_x, min_y, max_x, max_y, ..]) => {
                Some(BoundingBox::new(min_x, min_y, max_x, max_y))
            }
            Some(other) => {
                tracing::debug!(len = other.len(), "ignoring malformed bbox; deriving from arcs");
                None
            }
            None => None,
        };

        let document = Self::new(bounding_box, arcs, regions)?;
        tracing::info!(
            arcs = document.arcs.len(),
            regions = document.regions.len(),
            "topology loaded"
        );
        Ok(document)
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box
    }

    pub fn region_keys(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    /// Points of one arc in walking order, or `None` when the index is out of range.
    pub fn resolve_arc(&self, index: ArcIndex) -> Option<Vec<Point>> {
        let (arc, reversed) = self.arc(index)?;
        Some(if reversed {
            arc.iter().rev().copied().collect()
        } else {
            arc.to_vec()
        })
    }

    /// Closed rings of a region. Unknown keys yield no rings.
    pub fn decode_region(&self, region_key: &str) -> Vec<Ring> {
        let Some(geometry) = self.regions.get(region_key) else {
            return Vec::new();
        };
        geometry
            .rings()
            .map(|ring| self.assemble_ring(ring))
            .filter(|ring| !ring.is_empty())
            .collect()
    }

    fn arc(&self, index: ArcIndex) -> Option<(&[Point], bool)> {
        let slot = arc_slot(index)?;
        self.arcs.get(slot).map(|arc| (arc.as_slice(), index < 0))
    }

    /// Concatenate arcs; each arc after the first starts where the previous one
    /// ended, so its leading point is dropped.
    fn assemble_ring(&self, ring: &[ArcIndex]) -> Ring {
        let mut points = Ring::new();
        for &index in ring {
            let Some((arc, reversed)) = self.arc(index) else {
                continue;
            };
            let skip = usize::from(!points.is_empty());
            if reversed {
                points.extend(arc.iter().rev().skip(skip).copied());
            } else {
                points.extend(arc.iter().skip(skip).copied());
            }
        }
        points
    }
}

fn arc_slot(index: ArcIndex) -> Option<usize> {
    let slot = if index < 0 { !index } else { index };
    usize::try_from(slot).ok()
}

/// Decoded rings for every region, built once per topology load.
#[derive(Debug, Clone, Default)]
pub struct GeometryCache {
    bounding_box: Option<BoundingBox>,
    regions: HashMap<String, Vec<Ring>>,
}

impl GeometryCache {
    pub fn build(document: &TopologyDocument) -> Self {
        let regions = document
            .region_keys()
            .map(|key| (key.to_string(), document.decode_region(key)))
            .collect();
        Self {
            bounding_box: document.bounding_box(),
            regions,
        }
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box
    }

    /// Rings of a region; empty for unknown keys.
    pub fn rings(&self, region_key: &str) -> &[Ring] {
        self.regions
            .get(region_key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, region_key: &str) -> bool {
        self.regions.contains_key(region_key)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

// --- wire format ---

#[derive(Deserialize)]
struct RawTopology {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default, alias = "boundingBox")]
    bbox: Option<Vec<f64>>,
    #[serde(default)]
    transform: Option<RawTransform>,
    #[serde(default)]
    arcs: Vec<Vec<Vec<f64>>>,
    #[serde(default, alias = "regions")]
    objects: BTreeMap<String, RawGeometry>,
}

#[derive(Deserialize)]
struct RawTransform {
    scale: [f64; 2],
    translate: [f64; 2],
}

impl RawTransform {
    fn is_valid(&self) -> bool {
        self.scale.iter().all(|s| s.is_finite() && *s != 0.0)
            && self.translate.iter().all(|t| t.is_finite())
    }
}

#[derive(Deserialize)]
struct RawGeometry {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    arcs: Option<Value>,
    #[serde(default)]
    geometries: Vec<RawGeometry>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, Value>>,
}

impl RawGeometry {
    fn key(&self, keys: &KeySource) -> Option<String> {
        let value = match keys {
            KeySource::Id => self.id.as_ref(),
            KeySource::Property(name) => self.properties.as_ref().and_then(|p| p.get(name)),
        }?;
        match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn geometry(&self) -> Option<RegionGeometry> {
        let arcs = self.arcs.clone()?;
        match self.kind.as_deref()? {
            "Polygon" => serde_json::from_value(arcs).ok().map(RegionGeometry::Polygon),
            "MultiPolygon" => serde_json::from_value(arcs)
                .ok()
                .map(RegionGeometry::MultiPolygon),
            _ => None,
        }
    }
}

fn collect_regions(
    object: &RawGeometry,
    object_name: Option<&str>,
    keys: &KeySource,
    regions: &mut HashMap<String, RegionGeometry>,
) {
    if object.kind.as_deref() == Some("GeometryCollection") {
        for child in &object.geometries {
            collect_regions(child, None, keys, regions);
        }
        return;
    }

    let Some(geometry) = object.geometry() else {
        tracing::debug!(kind = ?object.kind, "skipping non-polygonal geometry");
        return;
    };
    let Some(key) = object.key(keys).or_else(|| object_name.map(str::to_string)) else {
        tracing::debug!("skipping geometry without a region key");
        return;
    };
    if regions.contains_key(&key) {
        tracing::warn!(key = %key, "duplicate region key in topology; keeping first");
        return;
    }
    regions.insert(key, geometry);
}

fn decode_arc(
    arc: usize,
    positions: &[Vec<f64>],
    transform: Option<&RawTransform>,
) -> Result<Vec<Point>, TopologyError> {
    let mut points = Vec::with_capacity(positions.len());
    let (mut qx, mut qy) = (0.0, 0.0);
    for position in positions {
        let &[x, y, ..] = position.as_slice() else {
            return Err(TopologyError::BadPosition { arc });
        };
        match transform {
            Some(t) => {
                qx += x;
                qy += y;
                points.push([
                    qx * t.scale[0] + t.translate[0],
                    qy * t.scale[1] + t.translate[1],
                ]);
            }
            None => points.push([x, y]),
        }
    }
    Ok(points)
}
