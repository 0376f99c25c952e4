//! Hotspot records.
//!
//! A hotspot is anchored in exactly one coordinate space: percent-of-image
//! (`Percent2D`) or scene units (`World3D`). On the wire the two variants
//! keep the flat shape existing data uses (`x`/`y` vs `position`), and a
//! record carrying both or neither is rejected on decode.

use foundation::math::Vec3;
use serde::{Deserialize, Serialize};

/// Which coordinate space a placement (or a viewpoint's editor) uses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CoordinateSpace {
    /// Percent of the flat image, `0..=100` on both axes.
    Image,
    /// Scene units of the point-cloud reconstruction.
    World,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Placement {
    Percent2D { x: f64, y: f64 },
    World3D { x: f64, y: f64, z: f64 },
}

impl Placement {
    pub fn space(&self) -> CoordinateSpace {
        match self {
            Placement::Percent2D { .. } => CoordinateSpace::Image,
            Placement::World3D { .. } => CoordinateSpace::World,
        }
    }

    pub fn world(p: Vec3) -> Self {
        Placement::World3D {
            x: p.x,
            y: p.y,
            z: p.z,
        }
    }

    /// World position for `World3D`, `None` for image placements.
    pub fn world_position(&self) -> Option<Vec3> {
        match *self {
            Placement::World3D { x, y, z } => Some(Vec3::new(x, y, z)),
            Placement::Percent2D { .. } => None,
        }
    }

    fn validate(&self, id: &str) -> Result<(), HotspotError> {
        match *self {
            Placement::Percent2D { x, y } => {
                for (axis, v) in [("x", x), ("y", y)] {
                    if !v.is_finite() {
                        return Err(HotspotError::NonFinite { id: id.to_string() });
                    }
                    if !(0.0..=100.0).contains(&v) {
                        return Err(HotspotError::PercentOutOfRange {
                            id: id.to_string(),
                            axis,
                            value: v,
                        });
                    }
                }
                Ok(())
            }
            Placement::World3D { x, y, z } => {
                if x.is_finite() && y.is_finite() && z.is_finite() {
                    Ok(())
                } else {
                    Err(HotspotError::NonFinite { id: id.to_string() })
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HotspotError {
    EmptyId,
    MissingPlacement { id: String },
    AmbiguousPlacement { id: String },
    IncompletePercent { id: String },
    PercentOutOfRange {
        id: String,
        axis: &'static str,
        value: f64,
    },
    NonFinite { id: String },
}

impl std::fmt::Display for HotspotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HotspotError::EmptyId => write!(f, "hotspot id must not be empty"),
            HotspotError::MissingPlacement { id } => {
                write!(f, "hotspot {id} has neither x/y nor position")
            }
            HotspotError::AmbiguousPlacement { id } => {
                write!(f, "hotspot {id} has both x/y and position")
            }
            HotspotError::IncompletePercent { id } => {
                write!(f, "hotspot {id} needs both x and y")
            }
            HotspotError::PercentOutOfRange { id, axis, value } => {
                write!(f, "hotspot {id}: {axis}={value} is outside 0..=100")
            }
            HotspotError::NonFinite { id } => write!(f, "hotspot {id} has a non-finite coordinate"),
        }
    }
}

impl std::error::Error for HotspotError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HotspotRecord", into = "HotspotRecord")]
pub struct Hotspot {
    pub id: String,
    pub placement: Placement,
    pub label: String,
    pub title: String,
    /// Display string, e.g. `"$49.00"`.
    pub price: Option<String>,
    /// Image references in display order.
    pub images: Vec<String>,
}

impl Hotspot {
    pub fn new(id: impl Into<String>, placement: Placement) -> Self {
        Self {
            id: id.into(),
            placement,
            label: String::new(),
            title: String::new(),
            price: None,
            images: Vec::new(),
        }
    }

    pub fn percent(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self::new(id, Placement::Percent2D { x, y })
    }

    pub fn world(id: impl Into<String>, position: Vec3) -> Self {
        Self::new(id, Placement::world(position))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn validate(&self) -> Result<(), HotspotError> {
        if self.id.trim().is_empty() {
            return Err(HotspotError::EmptyId);
        }
        self.placement.validate(&self.id)
    }
}

/// Flat wire shape shared with the persistence API.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HotspotRecord {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<[f64; 3]>,
    #[serde(default)]
    label: String,
    #[serde(default)]
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    price: Option<String>,
    #[serde(default)]
    images: Vec<String>,
}

impl TryFrom<HotspotRecord> for Hotspot {
    type Error = HotspotError;

    fn try_from(r: HotspotRecord) -> Result<Self, Self::Error> {
        let placement = match (r.x, r.y, r.position) {
            (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => {
                return Err(HotspotError::AmbiguousPlacement { id: r.id });
            }
            (Some(x), Some(y), None) => Placement::Percent2D { x, y },
            (None, None, Some([x, y, z])) => Placement::World3D { x, y, z },
            (Some(_), None, None) | (None, Some(_), None) => {
                return Err(HotspotError::IncompletePercent { id: r.id });
            }
            (None, None, None) => return Err(HotspotError::MissingPlacement { id: r.id }),
        };

        let hotspot = Hotspot {
            id: r.id,
            placement,
            label: r.label,
            title: r.title,
            price: r.price,
            images: r.images,
        };
        hotspot.validate()?;
        Ok(hotspot)
    }
}

impl From<Hotspot> for HotspotRecord {
    fn from(h: Hotspot) -> Self {
        let (x, y, position) = match h.placement {
            Placement::Percent2D { x, y } => (Some(x), Some(y), None),
            Placement::World3D { x, y, z } => (None, None, Some([x, y, z])),
        };
        HotspotRecord {
            id: h.id,
            x,
            y,
            position,
            label: h.label,
            title: h.title,
            price: h.price,
            images: h.images,
        }
    }
}
