pub mod borehole;
pub mod error;
pub mod fields;
pub mod model;
pub mod record;
pub mod rules;
pub mod section;
pub mod series;
pub mod store;

pub use borehole::{Borehole, Location};
pub use error::{RuleError, StoreError};
pub use fields::{FieldShape, HydraulicField};
pub use model::{FieldValue, HydraulicSample, RealValue};
pub use record::{BoreholeRecord, DatetimeValue, HydraulicSampleRecord, SectionRecord};
pub use section::{Section, SectionGeometry};
pub use series::{HydraulicSeries, TIME_COLUMN};
pub use store::{HydraulicStore, SectionKey};
