use std::collections::HashMap;

use crate::{
    foundation::core::Resolution,
    foundation::error::{DomeWarpError, DomeWarpResult},
    frame::Frame,
    render::backend::{RasterBackend, Readback, TargetId, TextureId, WarpDraw},
    render::shader::WARP_SHADER_WGSL,
    warp::map::WarpMap,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TextureKind {
    Input,
    Warp,
}

struct GpuTexture {
    kind: TextureKind,
    size: Resolution,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuTarget {
    size: Resolution,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: wgpu::Buffer,
    readback_bytes_per_row: u32,
}

struct WarpPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

/// `wgpu` rasteriser. Owns one device/queue pair; all calls must come from the owning thread.
pub struct WgpuRasterBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: WarpPipeline,
    next_id: u32,
    textures: HashMap<TextureId, GpuTexture>,
    targets: HashMap<TargetId, GpuTarget>,
}

impl WgpuRasterBackend {
    /// Acquire an adapter and device and compile the warp pipeline.
    pub fn new() -> DomeWarpResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                DomeWarpError::gpu_init("no gpu adapter available")
            }
            other => DomeWarpError::gpu_init(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("domewarp_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| DomeWarpError::gpu_init(format!("wgpu request_device failed: {e:?}")))?;

        let pipeline = create_warp_pipeline(&device)?;
        tracing::info!(adapter = ?adapter.get_info().name, "gpu raster backend ready");

        Ok(Self {
            device,
            queue,
            pipeline,
            next_id: 0,
            textures: HashMap::new(),
            targets: HashMap::new(),
        })
    }

    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn texture(&self, id: TextureId, kind: TextureKind) -> DomeWarpResult<&GpuTexture> {
        self.textures
            .get(&id)
            .filter(|t| t.kind == kind)
            .ok_or_else(|| {
                DomeWarpError::transform(format!("{kind:?} texture {id:?} does not exist"))
            })
    }

    fn create_sampled_texture(
        &mut self,
        kind: TextureKind,
        size: Resolution,
        format: wgpu::TextureFormat,
    ) -> DomeWarpResult<TextureId> {
        if size.is_empty() {
            return Err(DomeWarpError::gpu_init(format!(
                "{kind:?} texture must be non-empty, got {size}"
            )));
        }
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(match kind {
                TextureKind::Input => "domewarp_input",
                TextureKind::Warp => "domewarp_warp",
            }),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(DomeWarpError::gpu_init(format!(
                "failed to create {kind:?} texture {size}: {err}"
            )));
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = TextureId(self.alloc_id());
        self.textures.insert(
            id,
            GpuTexture {
                kind,
                size,
                texture,
                view,
            },
        );
        Ok(id)
    }
}

impl RasterBackend for WgpuRasterBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn create_input_texture(&mut self, size: Resolution) -> DomeWarpResult<TextureId> {
        self.create_sampled_texture(TextureKind::Input, size, wgpu::TextureFormat::Rgba8Unorm)
    }

    fn upload_input(&mut self, texture: TextureId, frame: &Frame) -> DomeWarpResult<()> {
        let tex = self.texture(texture, TextureKind::Input)?;
        if frame.resolution() != tex.size {
            return Err(DomeWarpError::transform(format!(
                "frame {} does not match input texture {}",
                frame.resolution(),
                tex.size
            )));
        }
        // No RGB8 texture format exists; expand (and drop row padding) on the way up.
        let rgba = frame.to_rgba8_tight();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(tex.size.width * 4),
                rows_per_image: Some(tex.size.height),
            },
            extent(tex.size),
        );
        Ok(())
    }

    fn create_warp_texture(&mut self, warp: &WarpMap) -> DomeWarpResult<TextureId> {
        let size = warp.resolution();
        let id =
            self.create_sampled_texture(TextureKind::Warp, size, wgpu::TextureFormat::Rgba32Float)?;
        let tex = self.texture(id, TextureKind::Warp)?;
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            warp.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 16),
                rows_per_image: Some(size.height),
            },
            extent(size),
        );
        Ok(id)
    }

    fn create_target(&mut self, size: Resolution) -> DomeWarpResult<TargetId> {
        if size.is_empty() {
            return Err(DomeWarpError::gpu_init(format!(
                "render target must be non-empty, got {size}"
            )));
        }
        let bytes_per_row_unpadded = size
            .width
            .checked_mul(4)
            .ok_or_else(|| DomeWarpError::gpu_init("render target width overflow"))?;
        let readback_bytes_per_row =
            align_to(bytes_per_row_unpadded, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer_size = u64::from(readback_bytes_per_row)
            .checked_mul(u64::from(size.height))
            .ok_or_else(|| DomeWarpError::gpu_init("readback buffer size overflow"))?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("domewarp_target"),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("domewarp_readback"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(DomeWarpError::gpu_init(format!(
                "render target {size} is incomplete: {err}"
            )));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = TargetId(self.alloc_id());
        self.targets.insert(
            id,
            GpuTarget {
                size,
                texture,
                view,
                readback,
                readback_bytes_per_row,
            },
        );
        Ok(id)
    }

    fn draw_warp(&mut self, draw: &WarpDraw) -> DomeWarpResult<()> {
        let input = self.texture(draw.input, TextureKind::Input)?;
        let warp = self.texture(draw.warp, TextureKind::Warp)?;
        let target = self
            .targets
            .get(&draw.target)
            .ok_or_else(|| DomeWarpError::transform("warp draw target does not exist"))?;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("domewarp_warp_bg"),
            layout: &self.pipeline.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&input.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.pipeline.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&warp.view),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("domewarp_warp_encoder"),
            });
        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("domewarp_warp_rp"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_pipeline(&self.pipeline.pipeline);
            rp.set_bind_group(0, &bind_group, &[]);
            rp.draw(0..3, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn flush(&mut self) -> DomeWarpResult<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| DomeWarpError::transform(format!("wgpu poll failed: {e:?}")))?;
        Ok(())
    }

    fn read_target(&mut self, target: TargetId) -> DomeWarpResult<Readback> {
        let t = self
            .targets
            .get(&target)
            .ok_or_else(|| DomeWarpError::transform(format!("target {target:?} does not exist")))?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("domewarp_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &t.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &t.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(t.readback_bytes_per_row),
                    rows_per_image: Some(t.size.height),
                },
            },
            extent(t.size),
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = t.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| DomeWarpError::transform(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| DomeWarpError::transform("readback channel closed"))?
            .map_err(|e| DomeWarpError::transform(format!("readback map failed: {e:?}")))?;

        let mapped = buffer_slice.get_mapped_range();
        let row_bytes = t.size.width as usize * 4;
        let padded_row_bytes = t.readback_bytes_per_row as usize;
        let mut out = Vec::with_capacity(row_bytes * t.size.height as usize);
        for row in 0..t.size.height as usize {
            let start = row * padded_row_bytes;
            out.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        drop(mapped);
        t.readback.unmap();

        Ok(Readback {
            width: t.size.width,
            height: t.size.height,
            rgba: out,
        })
    }

    fn release_texture(&mut self, texture: TextureId) {
        if let Some(t) = self.textures.remove(&texture) {
            t.texture.destroy();
        }
    }

    fn release_target(&mut self, target: TargetId) {
        if let Some(t) = self.targets.remove(&target) {
            t.texture.destroy();
            t.readback.destroy();
        }
    }

    fn live_resources(&self) -> usize {
        self.textures.len() + self.targets.len()
    }
}

fn create_warp_pipeline(device: &wgpu::Device) -> DomeWarpResult<WarpPipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("domewarp_input_sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("domewarp_warp_bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                },
                count: None,
            },
        ],
    });

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("domewarp_warp_shader"),
        source: wgpu::ShaderSource::Wgsl(WARP_SHADER_WGSL.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("domewarp_warp_pl"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("domewarp_warp_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: wgpu::TextureFormat::Rgba8Unorm,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(DomeWarpError::gpu_init(format!(
            "warp shader/pipeline compilation failed: {err}"
        )));
    }

    Ok(WarpPipeline {
        pipeline,
        bind_group_layout,
        sampler,
    })
}

fn extent(size: Resolution) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width,
        height: size.height,
        depth_or_array_layers: 1,
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}
