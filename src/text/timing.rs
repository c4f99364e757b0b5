use crate::errors::PipelineError;

// @module: Proportional duration allocation

/// A text unit placed on the narration timeline
#[derive(Debug, Clone, PartialEq)]
pub struct TimedUnit {
    // @field: Position of the unit in the run
    pub index: usize,

    // @field: Unit text
    pub text: String,

    // @field: Offset from the start of the narration in seconds
    pub start_secs: f64,

    // @field: Time budget in seconds
    pub duration_secs: f64,
}

impl TimedUnit {
    /// End of the unit on the timeline
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

/// Split `total_secs` across units in proportion to their character counts.
///
/// Character counts are Unicode scalar values, not bytes. When every unit is
/// empty the total is spread uniformly. There is no minimum per unit.
pub fn allocate_durations<S: AsRef<str>>(units: &[S], total_secs: f64) -> Result<Vec<f64>, PipelineError> {
    if units.is_empty() {
        return Err(PipelineError::InvalidInput(
            "cannot allocate durations for zero text units".to_string(),
        ));
    }
    if !total_secs.is_finite() || total_secs < 0.0 {
        return Err(PipelineError::InvalidInput(format!(
            "total duration must be a non-negative number, got {}",
            total_secs
        )));
    }

    let lengths: Vec<usize> = units.iter().map(|u| u.as_ref().chars().count()).collect();
    let total_chars: usize = lengths.iter().sum();

    if total_chars == 0 {
        let uniform = total_secs / units.len() as f64;
        return Ok(vec![uniform; units.len()]);
    }

    Ok(lengths
        .iter()
        .map(|&len| len as f64 / total_chars as f64 * total_secs)
        .collect())
}

/// Pair units with their durations and running start offsets
pub fn build_timeline<S: AsRef<str>>(units: &[S], durations: &[f64]) -> Vec<TimedUnit> {
    let mut start = 0.0;
    units
        .iter()
        .zip(durations)
        .enumerate()
        .map(|(index, (text, &duration))| {
            let unit = TimedUnit {
                index,
                text: text.as_ref().to_string(),
                start_secs: start,
                duration_secs: duration,
            };
            start += duration;
            unit
        })
        .collect()
}
