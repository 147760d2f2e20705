//! Simulation channels and the aligned time/glucose view handed to analysis.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[serde(rename = "t")]
    Time,
    Glucose,
    Insulin,
    InsulinInput,
    Meal,
    Target,
    Error,
}

impl Channel {
    pub const ALL: [Channel; 7] = [
        Channel::Time,
        Channel::Glucose,
        Channel::Insulin,
        Channel::InsulinInput,
        Channel::Meal,
        Channel::Target,
        Channel::Error,
    ];

    /// Key used in the `/api/results` payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Time => "t",
            Channel::Glucose => "glucose",
            Channel::Insulin => "insulin",
            Channel::InsulinInput => "insulin_input",
            Channel::Meal => "meal",
            Channel::Target => "target",
            Channel::Error => "error",
        }
    }

    /// Stored key names, most preferred first. Producers renamed channels
    /// between versions, so several spellings are accepted.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Channel::Time => &["t_vec"],
            Channel::Glucose => &["g_vec", "glucose", "G"],
            Channel::Insulin => &["i_vec", "insulin", "I"],
            Channel::InsulinInput => &["u_vec"],
            Channel::Meal => &["meal_vec", "meal"],
            Channel::Target => &["G_target_vec", "target"],
            Channel::Error => &["error_vec", "error"],
        }
    }
}

/// Every channel of one simulation run. Absent channels are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    pub t: Vec<f64>,
    pub glucose: Vec<f64>,
    pub insulin: Vec<f64>,
    pub insulin_input: Vec<f64>,
    pub meal: Vec<f64>,
    pub target: Vec<f64>,
    pub error: Vec<f64>,
}

impl SimulationResults {
    pub fn channel(&self, channel: Channel) -> &[f64] {
        match channel {
            Channel::Time => &self.t,
            Channel::Glucose => &self.glucose,
            Channel::Insulin => &self.insulin,
            Channel::InsulinInput => &self.insulin_input,
            Channel::Meal => &self.meal,
            Channel::Target => &self.target,
            Channel::Error => &self.error,
        }
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut Vec<f64> {
        match channel {
            Channel::Time => &mut self.t,
            Channel::Glucose => &mut self.glucose,
            Channel::Insulin => &mut self.insulin,
            Channel::InsulinInput => &mut self.insulin_input,
            Channel::Meal => &mut self.meal,
            Channel::Target => &mut self.target,
            Channel::Error => &mut self.error,
        }
    }

    pub fn is_empty(&self) -> bool {
        Channel::ALL.iter().all(|c| self.channel(*c).is_empty())
    }

    pub fn time_series(&self) -> TimeSeries<'_> {
        TimeSeries {
            time: &self.t,
            glucose: &self.glucose,
        }
    }
}

/// Borrowed view of the two channels the analyzer consumes.
#[derive(Debug, Clone, Copy)]
pub struct TimeSeries<'a> {
    pub time: &'a [f64],
    pub glucose: &'a [f64],
}

impl TimeSeries<'_> {
    /// True when no metrics can be computed.
    pub fn is_absent(&self) -> bool {
        self.time.is_empty() || self.glucose.is_empty()
    }
}
