//! # Curve Constants
//!
//! The curve engine needs a small table of fixed points before it can do
//! anything useful: the generator `G`, the Pedersen shift point `S`, and the
//! four Pedersen constant points `P1..P4`. This module owns that table.
//!
//! A [`CurveConstants`] is an ordinary value. Build one from the compiled-in
//! network table ([`CurveConstants::embedded`]) or load one from a JSON file
//! ([`CurveConstants::load`]), then hand it to a
//! [`StarkCurve`](super::curve::StarkCurve). Tests can build their own tables
//! out of any on-curve points.
//!
//! For callers that want a single process-wide table there is
//! [`CurveConstants::shared`]: initialized once, on first use, and read-only
//! afterwards. Concurrent first callers block on the same initialization and
//! all observe the same `Arc`. If initialization fails the slot stays empty,
//! so a later call can try again.
//!
//! ## JSON format
//!
//! ```json
//! {
//!   "generator":   ["0x1ef1…", "0x5668…"],
//!   "shift_point": ["0x49ee…", "0x3ca0…"],
//!   "constant_points": [["0x2342…", "0x3b05…"], …four entries…]
//! }
//! ```

use std::path::Path;
use std::sync::{Arc, OnceLock};

use parking_lot::{const_mutex, Mutex};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::curve::CurvePoint;
use super::field::Felt;

/// Generator of the prime-order group.
const GENERATOR: [&str; 2] = [
    "0x1ef15c18599971b7beced415a40f0c7deacfd9b0d1819e03d723d8bc943cfca",
    "0x5668060aa49730b7be4801df46ec62de53ecd11abe43a32873000c36e8dc1f",
];

/// Pedersen shift point. `pedersen_pair(0, 0)` is its x-coordinate.
const SHIFT_POINT: [&str; 2] = [
    "0x49ee3eba8c1600700ee1b87eb599f16716b0b1022947733551fde4050ca6804",
    "0x3ca0cfe4b3bc6ddf346d49d06ea0ed34e621062c0e056c1d0405d266e10268a",
];

/// Pedersen constant points: P1/P2 take the low 248 and high 4 bits of the
/// first input, P3/P4 the same for the second.
const CONSTANT_POINTS: [[&str; 2]; 4] = [
    [
        "0x234287dcbaffe7f969c748655fca9e58fa8120b6d56eb0c1080d17957ebe47b",
        "0x3b056f100f96fb21e889527d41f4e39940135dd7a6c94cc6ed0268ee89e5615",
    ],
    [
        "0x4fa56f376c83db33f9dab2656558f3399099ec1de5e3018b7a6932dba8aa378",
        "0x3fa0984c931c9e38113e0c0e47e4401562761f92a7a23b45168f4e80ff5b54d",
    ],
    [
        "0x4ba4cc166be8dec764910f75b45f74b40c690c74709e90f3aa372f0bd2d6997",
        "0x40301cf5c1751f4b971e46c4ede85fcac5c59a5ce5ae7c48151f27b24b219c",
    ],
    [
        "0x54302dcb0e6cc1c6e44cca8f61a63bb2ca65048d53fb325d36ff12c49a58202",
        "0x1b77b3e37d13504b348046268d8ae25ce98ad783c25561a879dcc77e99c2426",
    ],
];

static SHARED: OnceLock<Arc<CurveConstants>> = OnceLock::new();
static SHARED_INIT: Mutex<()> = const_mutex(());

/// Failures to obtain a usable constants table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstantsError {
    /// The table could not be read, parsed, or validated. Nothing that
    /// depends on the curve can run until this is resolved.
    #[error("curve constants unavailable: {0}")]
    Unavailable(String),

    /// The process-wide table was already initialized.
    #[error("curve constants are already initialized")]
    AlreadyInitialized,
}

/// The fixed points the curve engine depends on. Every point is validated
/// against the curve equation at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurveConstants {
    generator: CurvePoint,
    shift_point: CurvePoint,
    points: [CurvePoint; 4],
}

/// On-disk representation, coordinates as hex strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConstantsFile {
    generator: [String; 2],
    shift_point: [String; 2],
    constant_points: Vec<[String; 2]>,
}

impl CurveConstants {
    /// Builds a table from already-constructed points, checking each one.
    pub fn new(
        generator: CurvePoint,
        shift_point: CurvePoint,
        points: [CurvePoint; 4],
    ) -> Result<Self, ConstantsError> {
        let all = std::iter::once(("generator", &generator))
            .chain(std::iter::once(("shift_point", &shift_point)))
            .chain(points.iter().map(|p| ("constant_point", p)));
        for (name, point) in all {
            if point.is_infinity() {
                return Err(ConstantsError::Unavailable(format!(
                    "{} is the point at infinity",
                    name
                )));
            }
            if !point.is_on_curve() {
                return Err(ConstantsError::Unavailable(format!(
                    "{} is not on the curve",
                    name
                )));
            }
        }
        Ok(Self {
            generator,
            shift_point,
            points,
        })
    }

    /// The network's published table, compiled into the binary.
    pub fn embedded() -> Result<Self, ConstantsError> {
        let generator = parse_point("generator", &GENERATOR)?;
        let shift_point = parse_point("shift_point", &SHIFT_POINT)?;
        let mut points = [CurvePoint::Infinity; 4];
        for (slot, raw) in points.iter_mut().zip(CONSTANT_POINTS.iter()) {
            *slot = parse_point("constant_point", raw)?;
        }
        Self::new(generator, shift_point, points)
    }

    /// Parses the JSON format described in the module docs.
    pub fn from_json_str(json: &str) -> Result<Self, ConstantsError> {
        let file: ConstantsFile = serde_json::from_str(json)
            .map_err(|e| ConstantsError::Unavailable(format!("malformed constants file: {}", e)))?;

        if file.constant_points.len() != 4 {
            return Err(ConstantsError::Unavailable(format!(
                "expected 4 constant points, found {}",
                file.constant_points.len()
            )));
        }

        let generator = parse_point("generator", &file.generator)?;
        let shift_point = parse_point("shift_point", &file.shift_point)?;
        let mut points = [CurvePoint::Infinity; 4];
        for (slot, raw) in points.iter_mut().zip(file.constant_points.iter()) {
            *slot = parse_point("constant_point", raw)?;
        }
        Self::new(generator, shift_point, points)
    }

    /// Reads and parses a constants file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConstantsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ConstantsError::Unavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let constants = Self::from_json_str(&json)?;
        info!(path = %path.display(), "loaded curve constants");
        Ok(constants)
    }

    /// Serializes the table in the JSON format accepted by
    /// [`from_json_str`](Self::from_json_str).
    pub fn to_json(&self) -> String {
        let file = ConstantsFile {
            generator: point_strings(&self.generator),
            shift_point: point_strings(&self.shift_point),
            constant_points: self.points.iter().map(point_strings).collect(),
        };
        // Plain strings and arrays cannot fail to serialize.
        serde_json::to_string_pretty(&file).unwrap_or_default()
    }

    /// The process-wide table, initialized from the embedded constants on
    /// first use.
    pub fn shared() -> Result<Arc<CurveConstants>, ConstantsError> {
        if let Some(existing) = SHARED.get() {
            return Ok(Arc::clone(existing));
        }

        let _guard = SHARED_INIT.lock();
        if let Some(existing) = SHARED.get() {
            return Ok(Arc::clone(existing));
        }

        let constants = Arc::new(Self::embedded()?);
        // We hold the init lock, so nobody else can have set it meanwhile.
        let _ = SHARED.set(Arc::clone(&constants));
        debug!("process-wide curve constants initialized");
        Ok(constants)
    }

    /// Installs an externally loaded table as the process-wide one. Only
    /// possible before anything has called [`shared`](Self::shared).
    pub fn install_shared(constants: CurveConstants) -> Result<Arc<CurveConstants>, ConstantsError> {
        let _guard = SHARED_INIT.lock();
        if SHARED.get().is_some() {
            return Err(ConstantsError::AlreadyInitialized);
        }
        let constants = Arc::new(constants);
        let _ = SHARED.set(Arc::clone(&constants));
        info!("process-wide curve constants installed");
        Ok(constants)
    }

    pub fn generator(&self) -> &CurvePoint {
        &self.generator
    }

    pub fn shift_point(&self) -> &CurvePoint {
        &self.shift_point
    }

    /// `P1..P4`, in order.
    pub fn points(&self) -> &[CurvePoint; 4] {
        &self.points
    }
}

fn parse_point<S: AsRef<str>>(name: &str, raw: &[S; 2]) -> Result<CurvePoint, ConstantsError> {
    let x = Felt::from_hex(raw[0].as_ref())
        .map_err(|e| ConstantsError::Unavailable(format!("{}.x: {}", name, e)))?;
    let y = Felt::from_hex(raw[1].as_ref())
        .map_err(|e| ConstantsError::Unavailable(format!("{}.y: {}", name, e)))?;
    CurvePoint::new(x, y)
        .map_err(|_| ConstantsError::Unavailable(format!("{} is not on the curve", name)))
}

fn point_strings(point: &CurvePoint) -> [String; 2] {
    match point {
        CurvePoint::Affine(p) => [p.x().to_hex(), p.y().to_hex()],
        CurvePoint::Infinity => ["0x0".to_string(), "0x0".to_string()],
    }
}
