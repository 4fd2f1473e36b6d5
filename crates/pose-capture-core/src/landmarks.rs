use serde::{Deserialize, Serialize};

/// A normalized detector point. Serialized as `[x, y, z]` or `[x, y, z, visibility]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<f32>", try_from = "Vec<f32>")]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f32) -> Self {
        self.visibility = Some(visibility);
        self
    }

    fn without_visibility(self) -> Self {
        Self {
            visibility: None,
            ..self
        }
    }
}

impl From<Landmark> for Vec<f32> {
    fn from(lm: Landmark) -> Self {
        match lm.visibility {
            Some(v) => vec![lm.x, lm.y, lm.z, v],
            None => vec![lm.x, lm.y, lm.z],
        }
    }
}

impl TryFrom<Vec<f32>> for Landmark {
    type Error = String;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [x, y, z] => Ok(Landmark::new(*x, *y, *z)),
            [x, y, z, v] => Ok(Landmark::new(*x, *y, *z).with_visibility(*v)),
            other => Err(format!(
                "landmark needs 3 or 4 coordinates, got {}",
                other.len()
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hand {
    #[serde(default)]
    pub handedness: Option<Handedness>,
    pub landmarks: Vec<Landmark>,
}

/// Everything the detector found in one frame, in the detector's landmark order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Detection {
    pub pose: Vec<Landmark>,
    pub face: Vec<Landmark>,
    pub hands: Vec<Hand>,
}

impl Detection {
    pub fn is_empty(&self) -> bool {
        self.pose.is_empty()
            && self.face.is_empty()
            && self.hands.iter().all(|hand| hand.landmarks.is_empty())
    }

    pub fn landmark_count(&self) -> usize {
        self.pose.len()
            + self.face.len()
            + self.hands.iter().map(|hand| hand.landmarks.len()).sum::<usize>()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.pose
            .iter()
            .chain(self.face.iter())
            .chain(self.hands.iter().flat_map(|hand| hand.landmarks.iter()))
    }

    fn hand(&self, side: Handedness) -> Vec<Landmark> {
        self.hands
            .iter()
            .find(|hand| hand.handedness == Some(side))
            .map(|hand| hand.landmarks.iter().map(|lm| lm.without_visibility()).collect())
            .unwrap_or_default()
    }
}

/// Shape of the JSON written next to each image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkSchema {
    /// `pose_landmarks`, `face_landmarks`, `left_hand_landmarks`, `right_hand_landmarks`
    Holistic,
    /// `hands` (one list per detected hand) and `pose`
    HandsPose,
}

#[derive(Debug, Serialize)]
struct HolisticRecord {
    pose_landmarks: Vec<Landmark>,
    face_landmarks: Vec<Landmark>,
    left_hand_landmarks: Vec<Landmark>,
    right_hand_landmarks: Vec<Landmark>,
}

#[derive(Debug, Serialize)]
struct HandsPoseRecord {
    hands: Vec<Vec<Landmark>>,
    pose: Vec<Landmark>,
}

impl LandmarkSchema {
    /// Render a detection as a landmark record. Groups the detector did not
    /// produce are written as empty arrays.
    pub fn to_json(&self, detection: &Detection) -> serde_json::Result<String> {
        match self {
            LandmarkSchema::Holistic => serde_json::to_string_pretty(&HolisticRecord {
                pose_landmarks: detection.pose.clone(),
                face_landmarks: detection
                    .face
                    .iter()
                    .map(|lm| lm.without_visibility())
                    .collect(),
                left_hand_landmarks: detection.hand(Handedness::Left),
                right_hand_landmarks: detection.hand(Handedness::Right),
            }),
            LandmarkSchema::HandsPose => serde_json::to_string_pretty(&HandsPoseRecord {
                hands: detection
                    .hands
                    .iter()
                    .map(|hand| hand.landmarks.clone())
                    .collect(),
                pose: detection.pose.clone(),
            }),
        }
    }
}
