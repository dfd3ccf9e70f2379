mod desc;
mod results;
mod spec;

pub use desc::{ElectionDescription, ElectionSummary, OptionDescription};
pub use results::{ElectionResults, OptionResult};
pub use spec::{ElectionSpec, OptionSpec};
