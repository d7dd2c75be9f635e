//! FFmpeg release compatibility table.
//!
//! The unversioned catch-all library names can load any major version, so
//! after binding the runtime majors are matched against this table. A row
//! also carries the ABI facts that differ between releases. Supporting a new
//! release means adding a row.

use std::fmt;

/// Byte offsets of the `AVStream` fields the session reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLayout {
    pub index: usize,
    pub codecpar: usize,
    pub time_base: usize,
    pub duration: usize,
}

/// How channel information is exchanged with avcodec and swresample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelApi {
    /// Integer channel count: codec option `"ac"`, resampler options
    /// `"in_channel_count"` / `"out_channel_layout"` bitmask.
    Count,
    /// `AVChannelLayout` described as a string: codec option `"ch_layout"`,
    /// resampler options `"in_chlayout"` / `"out_chlayout"`.
    Layout,
}

/// One supported FFmpeg release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    pub name: &'static str,
    pub avutil: u32,
    pub avcodec: u32,
    pub avformat: u32,
    pub swresample: u32,
    /// Candidate `AVStream` layouts, most likely first. The session uses the
    /// first one that passes its consistency checks.
    pub stream_layouts: &'static [StreamLayout],
    pub channel_api: ChannelApi,
}

const LAYOUT_LAVF58: StreamLayout = StreamLayout {
    index: 0,
    codecpar: 208,
    time_base: 24,
    duration: 40,
};

const LAYOUT_LAVF59: StreamLayout = StreamLayout {
    index: 0,
    codecpar: 8,
    time_base: 24,
    duration: 40,
};

/// Layout with the public fields left in declaration order after the
/// internal ones moved out.
const LAYOUT_LAVF59_UNMOVED: StreamLayout = StreamLayout {
    index: 0,
    codecpar: 208,
    time_base: 16,
    duration: 32,
};

/// `AVStream` gained a leading `AVClass` pointer.
const LAYOUT_LAVF60: StreamLayout = StreamLayout {
    index: 8,
    codecpar: 16,
    time_base: 32,
    duration: 48,
};

pub const RELEASES: &[Release] = &[
    Release {
        name: "FFmpeg 4.x",
        avutil: 56,
        avcodec: 58,
        avformat: 58,
        swresample: 3,
        stream_layouts: &[LAYOUT_LAVF58],
        channel_api: ChannelApi::Count,
    },
    Release {
        name: "FFmpeg 5.x",
        avutil: 57,
        avcodec: 59,
        avformat: 59,
        swresample: 4,
        stream_layouts: &[LAYOUT_LAVF59, LAYOUT_LAVF59_UNMOVED],
        channel_api: ChannelApi::Count,
    },
    Release {
        name: "FFmpeg 6.x",
        avutil: 58,
        avcodec: 60,
        avformat: 60,
        swresample: 4,
        stream_layouts: &[LAYOUT_LAVF60, LAYOUT_LAVF59],
        channel_api: ChannelApi::Layout,
    },
    Release {
        name: "FFmpeg 7.x",
        avutil: 59,
        avcodec: 61,
        avformat: 61,
        swresample: 5,
        stream_layouts: &[LAYOUT_LAVF60],
        channel_api: ChannelApi::Layout,
    },
];

/// Runtime versions as reported by `*_version()`
/// (`major << 16 | minor << 8 | micro`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryVersions {
    pub avutil: u32,
    pub avcodec: u32,
    pub avformat: u32,
    pub swresample: u32,
}

impl LibraryVersions {
    pub fn majors(&self) -> [u32; 4] {
        [
            major(self.avutil),
            major(self.avcodec),
            major(self.avformat),
            major(self.swresample),
        ]
    }

    /// The release all four libraries belong to.
    pub fn release(&self) -> Option<&'static Release> {
        let [avutil, avcodec, avformat, swresample] = self.majors();
        RELEASES.iter().find(|r| {
            r.avutil == avutil
                && r.avcodec == avcodec
                && r.avformat == avformat
                && r.swresample == swresample
        })
    }
}

impl fmt::Display for LibraryVersions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avutil {}, avcodec {}, avformat {}, swresample {}",
            dotted(self.avutil),
            dotted(self.avcodec),
            dotted(self.avformat),
            dotted(self.swresample)
        )
    }
}

fn major(version: u32) -> u32 {
    version >> 16
}

fn dotted(version: u32) -> String {
    format!(
        "{}.{}.{}",
        version >> 16,
        (version >> 8) & 0xff,
        version & 0xff
    )
}
