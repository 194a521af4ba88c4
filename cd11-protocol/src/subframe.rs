//! Channel subframes carried inside data frame payloads.

use crate::error::CodecError;
use crate::time;
use crate::wire;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Duration, Utc};

/// Bytes of channel string consumed per channel.
const CHANNEL_STRING_ENTRY_LEN: usize = 10;

const CHANNEL_DESCRIPTION_LEN: usize = 24;

/// Header preceding the channel subframes of a data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSubframeHeader {
    pub num_channels: u32,
    /// Length of the time window covered by this frame, in milliseconds.
    pub frame_time_length: u32,
    pub nominal_time: DateTime<Utc>,
    /// Ten characters per channel, unpadded.
    pub channel_string: String,
}

impl ChannelSubframeHeader {
    pub fn read(buf: &mut Bytes) -> Result<Self, CodecError> {
        let num_channels = wire::get_u32(buf, "channel count")?;
        if num_channels == 0 {
            return Err(CodecError::BadCount {
                field: "channel count",
                value: 0,
            });
        }
        let frame_time_length = wire::get_u32(buf, "frame time length")?;
        let jd = wire::get_string(buf, "nominal time", time::TIMESTAMP_LEN)?;
        let nominal_time = time::parse_timestamp(&jd)?;
        let channel_string_count = wire::get_u32(buf, "channel string count")? as usize;
        if channel_string_count != num_channels as usize * CHANNEL_STRING_ENTRY_LEN {
            return Err(CodecError::ChannelStringMismatch {
                actual: channel_string_count,
                channels: num_channels,
            });
        }
        let padded = wire::padded_len(channel_string_count, 4);
        let raw = wire::get_bytes(buf, "channel string", padded)?;
        let channel_string = String::from_utf8_lossy(&raw[..channel_string_count]).into_owned();

        Ok(Self {
            num_channels,
            frame_time_length,
            nominal_time,
            channel_string,
        })
    }

    pub fn write(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let expected = self.num_channels as usize * CHANNEL_STRING_ENTRY_LEN;
        if self.channel_string.len() != expected {
            return Err(CodecError::ChannelStringMismatch {
                actual: self.channel_string.len(),
                channels: self.num_channels,
            });
        }
        buf.put_u32(self.num_channels);
        buf.put_u32(self.frame_time_length);
        wire::put_string(
            buf,
            "nominal time",
            &time::format_timestamp(&self.nominal_time),
            time::TIMESTAMP_LEN,
        )?;
        buf.put_u32(self.channel_string.len() as u32);
        wire::put_padded(buf, self.channel_string.as_bytes());
        Ok(())
    }

    /// Ten-character channel entries in wire order.
    pub fn channel_entries(&self) -> impl Iterator<Item = &str> {
        self.channel_string
            .as_bytes()
            .chunks(CHANNEL_STRING_ENTRY_LEN)
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or("").trim())
    }
}

/// One channel's worth of waveform samples within a data frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSubframe {
    pub channel_length: u32,
    pub authentication_offset: u32,
    pub authentication_on: bool,
    pub compression_format: u8,
    pub sensor_type: u8,
    pub data_format: u8,
    /// Calibration factor at the calibration period.
    pub calibration_factor: f32,
    pub calibration_period: f32,
    pub site_name: String,
    pub channel_name: String,
    pub location_name: String,
    pub uncompressed_format: String,
    pub start_time: DateTime<Utc>,
    pub subframe_time_length: u32,
    pub samples: u32,
    pub channel_status_size: u32,
    pub channel_status: Bytes,
    pub data_size: u32,
    pub channel_data: Bytes,
    pub subframe_count: u32,
    pub auth_key_identifier: u32,
    pub auth_size: u32,
    pub auth_value: Bytes,
}

impl ChannelSubframe {
    pub fn read(buf: &mut Bytes) -> Result<Self, CodecError> {
        let channel_length = wire::get_u32(buf, "channel length")?;
        let authentication_offset = wire::get_u32(buf, "authentication offset")?;
        let authentication_on = wire::get_u8(buf, "authentication flag")? != 0;
        let compression_format = wire::get_u8(buf, "compression format")?;
        let sensor_type = wire::get_u8(buf, "sensor type")?;
        let data_format = wire::get_u8(buf, "data format")?;
        let calibration_factor = wire::get_f32(buf, "calibration factor")?;
        let calibration_period = wire::get_f32(buf, "calibration period")?;

        let site_name = wire::get_string(buf, "site name", 5)?;
        let channel_name = wire::get_string(buf, "channel name", 3)?;
        let location_name = wire::get_string(buf, "location name", 2)?;
        let uncompressed_format = wire::get_string(buf, "uncompressed format", 2)?;

        let jd = wire::get_string(buf, "subframe start time", time::TIMESTAMP_LEN)?;
        let start_time = time::parse_timestamp(&jd)?;
        let subframe_time_length = wire::get_u32(buf, "subframe time length")?;
        let samples = wire::get_u32(buf, "sample count")?;

        let channel_status_size = wire::get_u32(buf, "channel status size")?;
        let status_padded = wire::padded_len(channel_status_size as usize, 4);
        let channel_status = wire::get_bytes(buf, "channel status", status_padded)?;

        let data_size = wire::get_u32(buf, "data size")?;
        let data_padded = wire::padded_len(data_size as usize, 4);
        let channel_data = wire::get_bytes(buf, "channel data", data_padded)?;

        let subframe_count = wire::get_u32(buf, "subframe count")?;
        let auth_key_identifier = wire::get_u32(buf, "auth key identifier")?;
        let auth_size = wire::get_u32(buf, "auth size")?;
        let auth_padded = wire::padded_len(auth_size as usize, 4);
        let auth_value = wire::get_bytes(buf, "auth value", auth_padded)?;

        Ok(Self {
            channel_length,
            authentication_offset,
            authentication_on,
            compression_format,
            sensor_type,
            data_format,
            calibration_factor,
            calibration_period,
            site_name,
            channel_name,
            location_name,
            uncompressed_format,
            start_time,
            subframe_time_length,
            samples,
            channel_status_size,
            channel_status,
            data_size,
            channel_data,
            subframe_count,
            auth_key_identifier,
            auth_size,
            auth_value,
        })
    }

    pub fn write(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.channel_status.len() != wire::padded_len(self.channel_status_size as usize, 4) {
            return Err(CodecError::BadPadding {
                field: "channel status",
                len: self.channel_status.len(),
            });
        }
        if self.channel_data.len() != wire::padded_len(self.data_size as usize, 4) {
            return Err(CodecError::BadPadding {
                field: "channel data",
                len: self.channel_data.len(),
            });
        }
        if self.auth_value.len() != wire::padded_len(self.auth_size as usize, 4) {
            return Err(CodecError::BadPadding {
                field: "subframe auth value",
                len: self.auth_value.len(),
            });
        }
        buf.put_u32(self.channel_length);
        buf.put_u32(self.authentication_offset);
        buf.put_u8(self.authentication_on as u8);
        buf.put_u8(self.compression_format);
        buf.put_u8(self.sensor_type);
        buf.put_u8(self.data_format);
        buf.put_f32(self.calibration_factor);
        buf.put_f32(self.calibration_period);
        wire::put_string(buf, "site name", &self.site_name, 5)?;
        wire::put_string(buf, "channel name", &self.channel_name, 3)?;
        wire::put_string(buf, "location name", &self.location_name, 2)?;
        wire::put_string(buf, "uncompressed format", &self.uncompressed_format, 2)?;
        wire::put_string(
            buf,
            "subframe start time",
            &time::format_timestamp(&self.start_time),
            time::TIMESTAMP_LEN,
        )?;
        buf.put_u32(self.subframe_time_length);
        buf.put_u32(self.samples);
        buf.put_u32(self.channel_status_size);
        buf.put_slice(&self.channel_status);
        buf.put_u32(self.data_size);
        buf.put_slice(&self.channel_data);
        buf.put_u32(self.subframe_count);
        buf.put_u32(self.auth_key_identifier);
        buf.put_u32(self.auth_size);
        buf.put_slice(&self.auth_value);
        Ok(())
    }

    /// Samples per second, derived from the sample count and the
    /// subframe's time span.
    pub fn sample_rate(&self) -> f64 {
        if self.subframe_time_length == 0 {
            return 0.0;
        }
        self.samples as f64 / self.subframe_time_length as f64 * 1000.0
    }

    /// Instant just past the last sample covered by this subframe.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::milliseconds(self.subframe_time_length as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn nominal_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 3, 1, 12, 0, 0).unwrap()
    }

    fn sample_subframe() -> ChannelSubframe {
        ChannelSubframe {
            channel_length: 96,
            authentication_offset: 0,
            authentication_on: false,
            compression_format: 0,
            sensor_type: 0,
            data_format: 1,
            calibration_factor: 0.0,
            calibration_period: 0.0,
            site_name: "KCC".to_string(),
            channel_name: "BHZ".to_string(),
            location_name: "01".to_string(),
            uncompressed_format: "s4".to_string(),
            start_time: nominal_time(),
            subframe_time_length: 10_000,
            samples: 400,
            channel_status_size: 0,
            channel_status: Bytes::new(),
            data_size: 8,
            channel_data: Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7, 8]),
            subframe_count: 0,
            auth_key_identifier: 0,
            auth_size: 0,
            auth_value: Bytes::new(),
        }
    }

    #[test]
    fn test_subframe_header_roundtrip() {
        let header = ChannelSubframeHeader {
            num_channels: 2,
            frame_time_length: 10_000,
            nominal_time: nominal_time(),
            channel_string: "KCC  BHZ01KCC  BHN01".to_string(),
        };
        let mut buf = BytesMut::new();
        header.write(&mut buf).unwrap();
        let decoded = ChannelSubframeHeader::read(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, header);
        let entries: Vec<&str> = decoded.channel_entries().collect();
        assert_eq!(entries, vec!["KCC  BHZ01", "KCC  BHN01"]);
    }

    #[test]
    fn test_subframe_header_rejects_zero_channels() {
        let mut buf = BytesMut::new();
        buf.put_u32(0);
        buf.put_u32(10_000);
        let err = ChannelSubframeHeader::read(&mut buf.freeze()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::BadCount {
                field: "channel count",
                ..
            }
        ));
    }

    #[test]
    fn test_subframe_header_rejects_count_mismatch() {
        let header = ChannelSubframeHeader {
            num_channels: 3,
            frame_time_length: 10_000,
            nominal_time: nominal_time(),
            channel_string: "KCC  BHZ01".to_string(),
        };
        let mut buf = BytesMut::new();
        assert!(header.write(&mut buf).is_err());
    }

    #[test]
    fn test_subframe_roundtrip() {
        let subframe = sample_subframe();
        let mut buf = BytesMut::new();
        subframe.write(&mut buf).unwrap();
        let decoded = ChannelSubframe::read(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, subframe);
    }

    #[test]
    fn test_subframe_unpadded_status_rejected() {
        let mut subframe = sample_subframe();
        subframe.channel_status_size = 3;
        subframe.channel_status = Bytes::from_static(&[1, 2, 3]);
        let mut buf = BytesMut::new();
        assert!(subframe.write(&mut buf).is_err());
    }

    #[test]
    fn test_sample_rate_and_end_time() {
        let subframe = sample_subframe();
        assert!((subframe.sample_rate() - 40.0).abs() < f64::EPSILON);
        assert_eq!(
            subframe.end_time(),
            nominal_time() + Duration::milliseconds(10_000)
        );
    }
}
