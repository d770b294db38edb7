use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Class ids of the trained hazard model, in model output order.
const MODEL_CLASS_TABLE: [HazardClass; 10] = [
    HazardClass::OilLeak,
    HazardClass::GasLeak,
    HazardClass::Fire,
    HazardClass::Smoke,
    HazardClass::ChemicalSpill,
    HazardClass::SafetyEquipment,
    HazardClass::Worker,
    HazardClass::Vehicle,
    HazardClass::PipeDamage,
    HazardClass::Corrosion,
];

/// Hazard categories a detection can belong to.
///
/// Serialized as its snake_case name; model class ids outside the known table
/// become `unknown_<id>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HazardClass {
    OilLeak,
    GasLeak,
    Fire,
    Smoke,
    ChemicalSpill,
    SafetyEquipment,
    Worker,
    Vehicle,
    PipeDamage,
    Corrosion,
    Unknown(u32),
}

impl HazardClass {
    /// Map a learned-model class id through the fixed class table.
    pub fn from_class_id(class_id: u32) -> Self {
        MODEL_CLASS_TABLE
            .get(class_id as usize)
            .copied()
            .unwrap_or(HazardClass::Unknown(class_id))
    }

    pub fn name(&self) -> &'static str {
        match self {
            HazardClass::OilLeak => "oil_leak",
            HazardClass::GasLeak => "gas_leak",
            HazardClass::Fire => "fire",
            HazardClass::Smoke => "smoke",
            HazardClass::ChemicalSpill => "chemical_spill",
            HazardClass::SafetyEquipment => "safety_equipment",
            HazardClass::Worker => "worker",
            HazardClass::Vehicle => "vehicle",
            HazardClass::PipeDamage => "pipe_damage",
            HazardClass::Corrosion => "corrosion",
            HazardClass::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for HazardClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HazardClass::Unknown(id) => write!(f, "unknown_{}", id),
            known => f.write_str(known.name()),
        }
    }
}

impl FromStr for HazardClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(known) = MODEL_CLASS_TABLE.iter().find(|c| c.name() == s) {
            return Ok(*known);
        }
        s.strip_prefix("unknown_")
            .and_then(|id| id.parse::<u32>().ok())
            .map(HazardClass::Unknown)
            .ok_or_else(|| anyhow!("unknown hazard class '{}'", s))
    }
}

impl Serialize for HazardClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HazardClass {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Which kind of detector produced a detection. Informational only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    LearnedModel,
    HeuristicColor,
    HeuristicTexture,
}

/// Axis-aligned box in source-frame pixel coordinates, `x1 <= x2`, `y1 <= y2`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Corners may be given in any order; they are sorted.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Box from a pixel rectangle `(x, y, w, h)`: `(x, y, x + w, y + h)`.
    pub fn from_rect(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::new(
            x as f32,
            y as f32,
            x.saturating_add(width) as f32,
            y.saturating_add(height) as f32,
        )
    }

    /// Clamp all coordinates into `[0, width] x [0, height]`.
    pub fn clamp_to(self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self::new(
            self.x1.clamp(0.0, w),
            self.y1.clamp(0.0, h),
            self.x2.clamp(0.0, w),
            self.y2.clamp(0.0, h),
        )
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// One hazard observation on one frame.
///
/// Immutable once built: confidence is clamped to `[0, 1]` and the box corners
/// are ordered by the constructor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    frame_index: u64,
    hazard_class: HazardClass,
    confidence: f32,
    bounding_box: BoundingBox,
    timestamp: DateTime<Utc>,
    detection_method: DetectionMethod,
}

impl Detection {
    pub fn new(
        frame_index: u64,
        hazard_class: HazardClass,
        confidence: f32,
        bounding_box: BoundingBox,
        detection_method: DetectionMethod,
    ) -> Self {
        Self::at(
            frame_index,
            hazard_class,
            confidence,
            bounding_box,
            detection_method,
            Utc::now(),
        )
    }

    /// Like `new`, with an explicit wall-clock timestamp.
    pub fn at(
        frame_index: u64,
        hazard_class: HazardClass,
        confidence: f32,
        bounding_box: BoundingBox,
        detection_method: DetectionMethod,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        let bounding_box = BoundingBox::new(
            bounding_box.x1,
            bounding_box.y1,
            bounding_box.x2,
            bounding_box.y2,
        );
        Self {
            frame_index,
            hazard_class,
            confidence,
            bounding_box,
            timestamp,
            detection_method,
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn hazard_class(&self) -> HazardClass {
        self.hazard_class
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn detection_method(&self) -> DetectionMethod {
        self.detection_method
    }

    /// Equal in everything except the wall-clock timestamp.
    pub fn same_observation(&self, other: &Detection) -> bool {
        self.frame_index == other.frame_index
            && self.hazard_class == other.hazard_class
            && self.confidence == other.confidence
            && self.bounding_box == other.bounding_box
            && self.detection_method == other.detection_method
    }
}
