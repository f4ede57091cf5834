/// Limits applied to every log record created from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecordLimits {
    max_number_of_attributes: usize,
    max_attribute_value_length: Option<usize>,
}

pub(crate) const DEFAULT_MAX_ATTRIBUTES: usize = 128;

impl Default for LogRecordLimits {
    fn default() -> Self {
        LogRecordLimits {
            max_number_of_attributes: DEFAULT_MAX_ATTRIBUTES,
            max_attribute_value_length: None,
        }
    }
}

impl LogRecordLimits {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> LogRecordLimitsBuilder {
        LogRecordLimitsBuilder {
            limits: LogRecordLimits::default(),
        }
    }

    /// Maximum number of distinct attributes kept on a record.
    pub fn max_number_of_attributes(&self) -> usize {
        self.max_number_of_attributes
    }

    /// Maximum length of string attribute values in characters, unlimited if
    /// `None`.
    pub fn max_attribute_value_length(&self) -> Option<usize> {
        self.max_attribute_value_length
    }
}

/// Builder for [`LogRecordLimits`].
///
/// Unlike the record hot path, configuration mistakes here are loud: invalid
/// limits panic at build time.
#[derive(Debug)]
pub struct LogRecordLimitsBuilder {
    limits: LogRecordLimits,
}

impl LogRecordLimitsBuilder {
    /// Sets the maximum number of attributes per record.
    pub fn with_max_number_of_attributes(mut self, max: usize) -> Self {
        self.limits.max_number_of_attributes = max;
        self
    }

    /// Sets the maximum length of string attribute values in characters.
    pub fn with_max_attribute_value_length(mut self, max: usize) -> Self {
        self.limits.max_attribute_value_length = Some(max);
        self
    }

    /// Builds the limits.
    ///
    /// # Panics
    ///
    /// Panics if any configured limit is zero.
    pub fn build(self) -> LogRecordLimits {
        assert!(
            self.limits.max_number_of_attributes > 0,
            "max_number_of_attributes must be positive"
        );
        assert!(
            self.limits.max_attribute_value_length != Some(0),
            "max_attribute_value_length must be positive"
        );
        self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let limits = LogRecordLimits::builder()
            .with_max_number_of_attributes(4)
            .with_max_attribute_value_length(16)
            .build();
        assert_eq!(limits.max_number_of_attributes(), 4);
        assert_eq!(limits.max_attribute_value_length(), Some(16));
    }

    #[test]
    #[should_panic(expected = "max_number_of_attributes must be positive")]
    fn zero_attribute_limit_panics() {
        let _ = LogRecordLimits::builder().with_max_number_of_attributes(0).build();
    }
}
