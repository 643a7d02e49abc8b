//! Identifiers and timestamps shared by every part of the workflow
use super::utils::new_uuid_to_bech32;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

// Opaque string ids. Foreign keys (facility, program, ...) are never owned by
// this crate, only carried.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $hrp:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }
            /// Generate a fresh bech32 encoded uuid7 id.
            pub fn generate() -> anyhow::Result<Self> {
                Ok(Self(new_uuid_to_bech32($hrp)?))
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl<C> minicbor::Encode<C> for $name {
            fn encode<W: minicbor::encode::Write>(
                &self,
                e: &mut minicbor::Encoder<W>,
                _: &mut C,
            ) -> Result<(), minicbor::encode::Error<W::Error>> {
                e.str(&self.0)?.ok()
            }
        }

        impl<'b, C> minicbor::Decode<'b, C> for $name {
            fn decode(
                d: &mut minicbor::Decoder<'b>,
                _: &mut C,
            ) -> Result<Self, minicbor::decode::Error> {
                Ok(Self(d.str()?.to_owned()))
            }
        }
    };
}

opaque_id!(
    /// Identity of a requisition aggregate.
    RequisitionId,
    "requisition_"
);
opaque_id!(UserId, "user_");
opaque_id!(
    /// Identity of a supervisory node in the approval hierarchy.
    NodeId,
    "node_"
);
opaque_id!(FacilityId, "facility_");
opaque_id!(ProgramId, "program_");
opaque_id!(PeriodId, "period_");
opaque_id!(OrderableId, "orderable_");
opaque_id!(TemplateId, "template_");

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(TimeStamp)
            .unwrap_or_else(|| TimeStamp(DateTime::<Utc>::UNIX_EPOCH))
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn ids_encode_as_plain_strings() {
        let id = RequisitionId::new("requisition_abc");

        let encoding = minicbor::to_vec(&id).unwrap();
        let text: String = minicbor::decode(&encoding).unwrap();
        let decode: RequisitionId = minicbor::decode(&encoding).unwrap();

        assert_eq!(text, "requisition_abc");
        assert_eq!(id, decode);
    }

    #[test]
    fn generated_ids_carry_prefix() {
        let id = NodeId::generate().unwrap();
        assert!(id.as_str().starts_with("node_1"));
    }
}
