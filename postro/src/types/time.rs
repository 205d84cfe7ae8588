use time::{Date, Duration, PrimitiveDateTime, UtcDateTime};

use crate::{
    Decode, DecodeError, Encode,
    encode::Encoded,
    postgres::{Oid, PgType},
    row::Column,
};

impl PgType for PrimitiveDateTime {
    /// date and time
    const OID: Oid = 1114;
}

impl PgType for UtcDateTime {
    /// date and time with timezone
    const OID: Oid = 1184;
}

impl PgType for Date {
    /// date
    const OID: Oid = 1082;
}

pub(crate) const PG_EPOCH_DATE: Date = match Date::from_julian_day(2_451_545) {
    Ok(ok) => ok,
    Err(_) => panic!("postgres epoch is a valid julian day"),
};

const PRIMITIVE_PG_EPOCH: PrimitiveDateTime = PrimitiveDateTime::new(PG_EPOCH_DATE, time::Time::MIDNIGHT);
const UTC_PG_EPOCH: UtcDateTime = UtcDateTime::new(PG_EPOCH_DATE, time::Time::MIDNIGHT);

fn read_i64(value: &[u8]) -> i64 {
    let mut be = [0u8; size_of::<i64>()];
    be.copy_from_slice(&value[..size_of::<i64>()]);
    i64::from_be_bytes(be)
}

fn read_i32(value: &[u8]) -> i32 {
    let mut be = [0u8; size_of::<i32>()];
    be.copy_from_slice(&value[..size_of::<i32>()]);
    i32::from_be_bytes(be)
}

impl Decode for PrimitiveDateTime {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        if column.oid() != Self::OID {
            return Err(DecodeError::OidMissmatch);
        }
        let value = column.try_into_value()?;
        assert_eq!(value.len(), size_of::<i64>(), "postgres did not return `i64`");
        Ok(PRIMITIVE_PG_EPOCH.saturating_add(Duration::microseconds(read_i64(&value))))
    }
}

impl Decode for UtcDateTime {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        if column.oid() != Self::OID {
            return Err(DecodeError::OidMissmatch);
        }
        let value = column.try_into_value()?;
        assert_eq!(value.len(), size_of::<i64>(), "postgres did not return `i64`");
        Ok(UTC_PG_EPOCH.saturating_add(Duration::microseconds(read_i64(&value))))
    }
}

impl Decode for Date {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        if column.oid() != Self::OID {
            return Err(DecodeError::OidMissmatch);
        }
        let value = column.try_into_value()?;
        assert_eq!(value.len(), size_of::<i32>(), "postgres did not return `i32`");
        PG_EPOCH_DATE
            .checked_add(Duration::days(read_i32(&value) as i64))
            .ok_or(DecodeError::OidMissmatch)
    }
}

impl Encode<'static> for PrimitiveDateTime {
    fn encode(self) -> Encoded<'static> {
        let micros = (self - PRIMITIVE_PG_EPOCH).whole_microseconds() as i64;
        Encoded::copy_from_slice(&micros.to_be_bytes(), Self::OID)
    }
}

impl Encode<'static> for UtcDateTime {
    fn encode(self) -> Encoded<'static> {
        let micros = (self - UTC_PG_EPOCH).whole_microseconds() as i64;
        Encoded::copy_from_slice(&micros.to_be_bytes(), Self::OID)
    }
}

impl Encode<'static> for Date {
    fn encode(self) -> Encoded<'static> {
        let days = (self - PG_EPOCH_DATE).whole_days() as i32;
        Encoded::copy_from_slice(&days.to_be_bytes(), Self::OID)
    }
}
