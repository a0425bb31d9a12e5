//! MJPEG datagram decoding with FFmpeg (libavcodec).

use anyhow::Context;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, format::Pixel, software::scaling, util::frame::video::Video};
use tracing::info;

use roverlink::video::FrameDecoder;

/// Holds one decoded YUV420p frame.
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub y_stride: usize,
    pub uv_stride: usize,
    pub y_plane: Vec<u8>,
    pub u_plane: Vec<u8>,
    pub v_plane: Vec<u8>,
}

/// Decodes one self-contained JPEG per call.
pub struct MjpegDecoder {
    decoder: ffmpeg::decoder::Video,
    /// Converter for JPEGs whose chroma layout is not 4:2:0, keyed by source format and size.
    scaler: Option<(Pixel, u32, u32, scaling::Context)>,
}

impl MjpegDecoder {
    pub fn new() -> anyhow::Result<Self> {
        ffmpeg::init().context("Failed to init ffmpeg")?;
        let codec = ffmpeg::decoder::find(codec::Id::MJPEG).context("MJPEG decoder not found")?;
        info!("Using video decoder: {}", codec.name());
        let decoder = codec::Context::new_with_codec(codec)
            .decoder()
            .video()
            .context("Failed to open MJPEG decoder")?;
        Ok(Self {
            decoder,
            scaler: None,
        })
    }

    fn to_yuv420p(&mut self, frame: Video) -> anyhow::Result<Video> {
        let format = frame.format();
        if matches!(format, Pixel::YUV420P | Pixel::YUVJ420P) {
            return Ok(frame);
        }
        let (w, h) = (frame.width(), frame.height());
        let reusable = matches!(
            &self.scaler,
            Some((f, sw, sh, _)) if *f == format && *sw == w && *sh == h
        );
        if !reusable {
            let ctx = scaling::Context::get(format, w, h, Pixel::YUV420P, w, h, scaling::Flags::BILINEAR)
                .with_context(|| format!("No converter from {format:?} to YUV420P"))?;
            self.scaler = Some((format, w, h, ctx));
        }
        let mut out = Video::empty();
        if let Some((_, _, _, scaler)) = self.scaler.as_mut() {
            scaler.run(&frame, &mut out).context("Failed to convert frame")?;
        }
        Ok(out)
    }
}

impl FrameDecoder for MjpegDecoder {
    type Frame = DecodedFrame;

    fn decode(&mut self, payload: &[u8]) -> anyhow::Result<DecodedFrame> {
        let packet = ffmpeg::Packet::copy(payload);
        self.decoder
            .send_packet(&packet)
            .context("Failed to send packet to decoder")?;
        let mut frame = Video::empty();
        self.decoder
            .receive_frame(&mut frame)
            .context("Datagram did not hold a complete frame")?;

        let frame = self.to_yuv420p(frame)?;
        Ok(DecodedFrame {
            width: frame.width(),
            height: frame.height(),
            y_stride: frame.stride(0),
            uv_stride: frame.stride(1),
            y_plane: frame.data(0).to_vec(),
            u_plane: frame.data(1).to_vec(),
            v_plane: frame.data(2).to_vec(),
        })
    }
}
