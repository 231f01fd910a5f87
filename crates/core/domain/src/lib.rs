pub mod alarm;
pub mod clock;
pub mod control;
pub mod data;
pub mod hook;
pub mod logic;
pub mod schedule;

pub use alarm::{ActiveAlarmState, AlarmKind, AlarmRule, AlarmStatus, Severity};
pub use clock::{Clock, ManualClock, SystemClock, now_epoch_ms};
pub use control::{DeviceBinding, VendorControl};
pub use data::{Connection, Quality, RuntimeValue, Tag, TagReader, TagSample, TagValueType};
pub use hook::{HookAction, HookRule};
pub use logic::{
    CompareOp, DeviceAction, GlobalSchedule, GlobalSettings, LogicCondition, LogicRule,
    LogicRuleSet, RuleRuntimeState, ScheduledThreshold, StopCondition, ThresholdSource,
};
pub use schedule::{ScheduleWindow, TimeOfDayError, TimeWindow, parse_hhmm};
