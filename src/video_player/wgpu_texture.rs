// SPDX-License-Identifier: MPL-2.0
//! wgpu texture backend.
//!
//! Frames arrive as packed RGB24. wgpu has no three-channel 8-bit format, so
//! each upload expands the rows to RGBA into a reused staging buffer and
//! writes it with `queue.write_texture()`. The texture itself is only
//! recreated when the sink sees a geometry change.

use super::texture::{TextureBackend, TextureFilter};
use crate::error::Result;

/// A video frame texture with its view and sampler.
#[derive(Debug)]
pub struct WgpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

/// [`TextureBackend`] writing into wgpu textures.
#[derive(Debug)]
pub struct WgpuTextureBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    staging: Vec<u8>,
}

impl WgpuTextureBackend {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            staging: Vec::new(),
        }
    }

    fn create_sampler(&self, min: TextureFilter, mag: TextureFilter) -> wgpu::Sampler {
        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Video Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter_mode(mag),
            min_filter: filter_mode(min),
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        })
    }
}

fn filter_mode(filter: TextureFilter) -> wgpu::FilterMode {
    match filter {
        TextureFilter::Nearest => wgpu::FilterMode::Nearest,
        TextureFilter::Linear => wgpu::FilterMode::Linear,
    }
}

/// Expands packed RGB24 pixels to RGBA with opaque alpha.
pub(crate) fn expand_rgb_to_rgba(rgb: &[u8], rgba: &mut Vec<u8>) {
    rgba.clear();
    rgba.reserve(rgb.len() / 3 * 4);
    for pixel in rgb.chunks_exact(3) {
        rgba.extend_from_slice(&[pixel[0], pixel[1], pixel[2], u8::MAX]);
    }
}

impl TextureBackend for WgpuTextureBackend {
    type Texture = WgpuTexture;

    fn create(&mut self, width: u32, height: u32) -> Result<WgpuTexture> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Video Frame Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            // Decoded frames are already gamma-encoded; an sRGB format would
            // apply the curve twice.
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.create_sampler(TextureFilter::Linear, TextureFilter::Linear);

        Ok(WgpuTexture {
            texture,
            view,
            sampler,
            width,
            height,
        })
    }

    fn upload(
        &mut self,
        texture: &mut WgpuTexture,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<()> {
        expand_rgb_to_rgba(pixels, &mut self.staging);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.staging,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn set_filter(&mut self, texture: &mut WgpuTexture, min: TextureFilter, mag: TextureFilter) {
        // Samplers are immutable in wgpu.
        texture.sampler = self.create_sampler(min, mag);
    }

    fn dispose(&mut self, texture: WgpuTexture) {
        texture.texture.destroy();
    }
}
