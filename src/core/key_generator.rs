use std::collections::HashSet;

use chrono::{DateTime, Duration, DurationRound, Utc};

use super::{DataType, Value};

/// Issues temporary client-side key values for entities that are added
/// before the server has assigned their real key.
///
/// Numeric keys count down from -1 so they can never collide with
/// server-assigned identities. DateTime keys are strictly increasing at
/// millisecond resolution, the precision entity keys compare at.
#[derive(Debug)]
pub struct KeyGenerator {
    next_number: i64,
    last_instant: Option<DateTime<Utc>>,
    issued: HashSet<(String, String)>,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self {
            next_number: -1,
            last_instant: None,
            issued: HashSet::new(),
        }
    }

    pub(crate) fn next_number(&mut self) -> i64 {
        let result = self.next_number;
        self.next_number -= 1;
        result
    }

    pub(crate) fn next_instant(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = now
            .duration_trunc(Duration::milliseconds(1))
            .unwrap_or(now);
        let next = match self.last_instant {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_instant = Some(next);
        next
    }

    /// Generates and records a temporary key value for `type_name`.
    pub fn generate_temp_key_value(&mut self, type_name: &str, data_type: DataType) -> Option<Value> {
        let value = data_type.next_key_value(self)?;
        self.issued
            .insert((type_name.to_string(), value.key_string()));
        Some(value)
    }

    pub fn is_temp_key(&self, type_name: &str, value: &Value) -> bool {
        self.issued
            .contains(&(type_name.to_string(), value.key_string()))
    }

    /// Forgets a temporary key once the real key has replaced it.
    pub fn release(&mut self, type_name: &str, value: &Value) -> bool {
        self.issued
            .remove(&(type_name.to_string(), value.key_string()))
    }

    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}
