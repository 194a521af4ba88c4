//! Payload variants, one per frame type.
//!
//! The payload is a closed tagged union: the header's frame type selects
//! the variant, and every variant's encode/decode pair is an exact
//! inverse. Connection and option exchanges share one shape for request
//! and response; the header tag carries the direction.

use crate::error::CodecError;
use crate::frame::FrameType;
use crate::subframe::{ChannelSubframe, ChannelSubframeHeader};
use crate::time;
use crate::wire;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};

/// Wire width of the ACKNACK frame-set-acked field.
pub const FRAME_SET_LEN: usize = 20;

const STATION_LEN: usize = 8;
const SITE_LEN: usize = 5;
const CHANNEL_LEN: usize = 3;
const LOC_LEN: usize = 2;

/// A receiver's report of its current sequence window and the gaps
/// within it, driving retransmission at the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknack {
    /// Name of the frame set being acknowledged, e.g. `STA01:0`.
    pub frame_set_acked: String,
    pub lowest_seq_num: u64,
    pub highest_seq_num: u64,
    /// Flattened gap ranges, two entries per gap. Always even-length.
    pub gap_ranges: Vec<u64>,
}

impl Acknack {
    pub fn gap_count(&self) -> u32 {
        (self.gap_ranges.len() / 2) as u32
    }

    fn read(buf: &mut Bytes) -> Result<Self, CodecError> {
        let frame_set_acked = wire::get_string(buf, "frame set acked", FRAME_SET_LEN)?;
        let lowest_seq_num = wire::get_u64(buf, "lowest sequence number")?;
        let highest_seq_num = wire::get_u64(buf, "highest sequence number")?;
        let gap_count = wire::get_u32(buf, "gap count")? as usize;

        // Sanity bound before allocating: each gap is two u64s.
        let needed = gap_count * 16;
        if buf.remaining() < needed {
            return Err(CodecError::BadCount {
                field: "gap",
                value: gap_count as u64,
            });
        }
        let mut gap_ranges = Vec::with_capacity(gap_count * 2);
        for _ in 0..gap_count * 2 {
            gap_ranges.push(buf.get_u64());
        }

        Ok(Self {
            frame_set_acked,
            lowest_seq_num,
            highest_seq_num,
            gap_ranges,
        })
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.gap_ranges.len() % 2 != 0 {
            return Err(CodecError::BadCount {
                field: "gap range",
                value: self.gap_ranges.len() as u64,
            });
        }
        wire::put_string(buf, "frame set acked", &self.frame_set_acked, FRAME_SET_LEN)?;
        buf.put_u64(self.lowest_seq_num);
        buf.put_u64(self.highest_seq_num);
        buf.put_u32(self.gap_count());
        for value in &self.gap_ranges {
            buf.put_u64(*value);
        }
        Ok(())
    }
}

/// A terminal notification; the peer sends one before dropping the
/// connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub message: String,
}

impl Alert {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn read(buf: &mut Bytes) -> Result<Self, CodecError> {
        let size = wire::get_u32(buf, "alert size")? as usize;
        let padded = wire::padded_len(size, 4);
        let raw = wire::get_bytes(buf, "alert message", padded)?;
        Ok(Self {
            message: wire::strip_padding(&raw),
        })
    }

    fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(self.message.len() as u32);
        wire::put_padded(buf, self.message.as_bytes());
    }
}

/// A command directed at a station's site/channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub station_name: String,
    pub site: String,
    pub channel: String,
    pub loc_name: String,
    pub timestamp: DateTime<Utc>,
    pub command_message: String,
}

impl CommandRequest {
    fn read(buf: &mut Bytes) -> Result<Self, CodecError> {
        let station_name = wire::get_string(buf, "station name", STATION_LEN)?;
        let site = wire::get_string(buf, "site", SITE_LEN)?;
        let channel = wire::get_string(buf, "channel", CHANNEL_LEN)?;
        let loc_name = wire::get_string(buf, "location name", LOC_LEN)?;
        // Two NUL bytes align the timestamp field.
        wire::get_bytes(buf, "command padding", 2)?;
        let jd = wire::get_string(buf, "command timestamp", time::TIMESTAMP_LEN)?;
        let timestamp = time::parse_timestamp(&jd)?;
        let size = wire::get_u32(buf, "command message size")? as usize;
        let message = wire::get_bytes(buf, "command message", size)?;

        Ok(Self {
            station_name,
            site,
            channel,
            loc_name,
            timestamp,
            command_message: wire::strip_padding(&message),
        })
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        wire::put_string(buf, "station name", &self.station_name, STATION_LEN)?;
        wire::put_string(buf, "site", &self.site, SITE_LEN)?;
        wire::put_string(buf, "channel", &self.channel, CHANNEL_LEN)?;
        wire::put_string(buf, "location name", &self.loc_name, LOC_LEN)?;
        buf.put_bytes(0, 2);
        wire::put_string(
            buf,
            "command timestamp",
            &time::format_timestamp(&self.timestamp),
            time::TIMESTAMP_LEN,
        )?;
        buf.put_u32(self.command_message.len() as u32);
        buf.put_slice(self.command_message.as_bytes());
        Ok(())
    }
}

/// A station's response to a previously issued command; carries the
/// original request text alongside the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub responder_station: String,
    pub site: String,
    pub channel: String,
    pub loc_name: String,
    pub timestamp: DateTime<Utc>,
    pub command_request_message: String,
    pub response_message: String,
}

impl CommandResponse {
    fn read(buf: &mut Bytes) -> Result<Self, CodecError> {
        let responder_station = wire::get_string(buf, "responder station", STATION_LEN)?;
        let site = wire::get_string(buf, "site", SITE_LEN)?;
        let channel = wire::get_string(buf, "channel", CHANNEL_LEN)?;
        let loc_name = wire::get_string(buf, "location name", LOC_LEN)?;
        wire::get_bytes(buf, "response padding", 2)?;
        let jd = wire::get_string(buf, "response timestamp", time::TIMESTAMP_LEN)?;
        let timestamp = time::parse_timestamp(&jd)?;
        let request_size = wire::get_u32(buf, "command request size")? as usize;
        let request = wire::get_bytes(buf, "command request message", request_size)?;
        let response_size = wire::get_u32(buf, "response size")? as usize;
        let response = wire::get_bytes(buf, "response message", response_size)?;

        Ok(Self {
            responder_station,
            site,
            channel,
            loc_name,
            timestamp,
            command_request_message: wire::strip_padding(&request),
            response_message: wire::strip_padding(&response),
        })
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        wire::put_string(buf, "responder station", &self.responder_station, STATION_LEN)?;
        wire::put_string(buf, "site", &self.site, SITE_LEN)?;
        wire::put_string(buf, "channel", &self.channel, CHANNEL_LEN)?;
        wire::put_string(buf, "location name", &self.loc_name, LOC_LEN)?;
        buf.put_bytes(0, 2);
        wire::put_string(
            buf,
            "response timestamp",
            &time::format_timestamp(&self.timestamp),
            time::TIMESTAMP_LEN,
        )?;
        buf.put_u32(self.command_request_message.len() as u32);
        buf.put_slice(self.command_request_message.as_bytes());
        buf.put_u32(self.response_message.len() as u32);
        buf.put_slice(self.response_message.as_bytes());
        Ok(())
    }
}

/// Connection negotiation payload; request and response share this shape
/// and are distinguished by the header frame type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionExchange {
    pub major_version: u16,
    pub minor_version: u16,
    pub station_or_responder_name: String,
    pub station_or_responder_type: String,
    pub service_type: String,
    pub ip_address: u32,
    pub port: u16,
    pub second_ip_address: u32,
    pub second_port: u16,
}

impl ConnectionExchange {
    fn read(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            major_version: wire::get_u16(buf, "major version")?,
            minor_version: wire::get_u16(buf, "minor version")?,
            station_or_responder_name: wire::get_string(buf, "station name", STATION_LEN)?,
            station_or_responder_type: wire::get_string(buf, "station type", 4)?,
            service_type: wire::get_string(buf, "service type", 4)?,
            ip_address: wire::get_u32(buf, "ip address")?,
            port: wire::get_u16(buf, "port")?,
            second_ip_address: wire::get_u32(buf, "second ip address")?,
            second_port: wire::get_u16(buf, "second port")?,
        })
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u16(self.major_version);
        buf.put_u16(self.minor_version);
        wire::put_string(
            buf,
            "station name",
            &self.station_or_responder_name,
            STATION_LEN,
        )?;
        wire::put_string(buf, "station type", &self.station_or_responder_type, 4)?;
        wire::put_string(buf, "service type", &self.service_type, 4)?;
        buf.put_u32(self.ip_address);
        buf.put_u16(self.port);
        buf.put_u32(self.second_ip_address);
        buf.put_u16(self.second_port);
        Ok(())
    }
}

/// Option negotiation payload; request and response share this shape.
/// Only single-option exchanges are carried (option count is fixed at 1
/// on the wire, matching the receiver this protocol was built against).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionExchange {
    pub option_type: u32,
    pub option_value: String,
}

impl OptionExchange {
    fn read(buf: &mut Bytes) -> Result<Self, CodecError> {
        // Option count; always 1 in practice, skipped on read.
        wire::get_u32(buf, "option count")?;
        let option_type = wire::get_u32(buf, "option type")?;
        let size = wire::get_u32(buf, "option size")? as usize;
        let padded = wire::padded_len(size, 4);
        let raw = wire::get_bytes(buf, "option value", padded)?;
        Ok(Self {
            option_type,
            option_value: wire::strip_padding(&raw),
        })
    }

    fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(1);
        buf.put_u32(self.option_type);
        buf.put_u32(self.option_value.len() as u32);
        wire::put_padded(buf, self.option_value.as_bytes());
    }
}

/// Waveform data payload: a subframe header followed by one channel
/// subframe per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub subframe_header: ChannelSubframeHeader,
    pub channel_subframes: Vec<ChannelSubframe>,
}

impl Data {
    fn read(buf: &mut Bytes) -> Result<Self, CodecError> {
        let subframe_header = ChannelSubframeHeader::read(buf)?;
        let count = subframe_header.num_channels as usize;
        // Each subframe is at least 80 bytes; bound before allocating.
        if buf.remaining() < count * 80 {
            return Err(CodecError::BadCount {
                field: "channel subframe",
                value: count as u64,
            });
        }
        let mut channel_subframes = Vec::with_capacity(count);
        for _ in 0..count {
            channel_subframes.push(ChannelSubframe::read(buf)?);
        }
        if buf.has_remaining() {
            tracing::warn!(
                remaining = buf.remaining(),
                "not all bytes of data frame payload parsed"
            );
        }
        Ok(Self {
            subframe_header,
            channel_subframes,
        })
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        self.subframe_header.write(buf)?;
        for subframe in &self.channel_subframes {
            subframe.write(buf)?;
        }
        Ok(())
    }
}

/// The closed union of payload variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Acknack(Acknack),
    Alert(Alert),
    CommandRequest(CommandRequest),
    CommandResponse(CommandResponse),
    ConnectionExchange(ConnectionExchange),
    Data(Data),
    OptionExchange(OptionExchange),
}

impl Payload {
    /// Decodes the payload variant selected by `frame_type`.
    pub fn read(frame_type: FrameType, buf: &mut Bytes) -> Result<Self, CodecError> {
        match frame_type {
            FrameType::Acknack => Acknack::read(buf).map(Payload::Acknack),
            FrameType::Alert => Alert::read(buf).map(Payload::Alert),
            FrameType::CommandRequest => CommandRequest::read(buf).map(Payload::CommandRequest),
            FrameType::CommandResponse => {
                CommandResponse::read(buf).map(Payload::CommandResponse)
            }
            FrameType::ConnectionRequest | FrameType::ConnectionResponse => {
                ConnectionExchange::read(buf).map(Payload::ConnectionExchange)
            }
            FrameType::Data => Data::read(buf).map(Payload::Data),
            FrameType::OptionRequest | FrameType::OptionResponse => {
                OptionExchange::read(buf).map(Payload::OptionExchange)
            }
        }
    }

    pub fn write(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        match self {
            Payload::Acknack(p) => p.write(buf),
            Payload::Alert(p) => {
                p.write(buf);
                Ok(())
            }
            Payload::CommandRequest(p) => p.write(buf),
            Payload::CommandResponse(p) => p.write(buf),
            Payload::ConnectionExchange(p) => p.write(buf),
            Payload::Data(p) => p.write(buf),
            Payload::OptionExchange(p) => {
                p.write(buf);
                Ok(())
            }
        }
    }
}
