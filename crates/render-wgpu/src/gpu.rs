use glam::Mat4;
use meshview_common::{ClearColor, Vertex};
use meshview_render::{
    AttributeFormat, CompiledProgram, GraphicsBackend, ProgramSlots, RenderError, Viewport,
};
use std::collections::HashMap;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Byte size of one `mat4x4<f32>` uniform.
const MATRIX_SIZE: u64 = std::mem::size_of::<[f32; 16]>() as u64;
/// Draws a fresh uniform ring holds before it has to grow.
const INITIAL_RING_SLOTS: u32 = 64;

/// A linked program: its pipeline and the layout of its uniform bind group.
pub struct WgpuProgram {
    id: u32,
    label: String,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    slots: ProgramSlots,
}

impl WgpuProgram {
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// GPU buffers of one model.
pub struct WgpuMesh {
    id: u32,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl WgpuMesh {
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Per-frame uniform storage with one slot per `set_parameters` call.
///
/// A slot holds view-projection then world. Queued writes all land before the
/// frame's single submit, so each draw reads its own slot through a dynamic
/// offset instead of sharing a buffer with other draws of the same mesh.
struct UniformRing {
    buffer: wgpu::Buffer,
    stride: u64,
    capacity: u32,
    next: u32,
}

impl UniformRing {
    fn new(device: &wgpu::Device, stride: u64, capacity: u32) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform_ring"),
            size: stride * u64::from(capacity),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            stride,
            capacity,
            next: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.next >= self.capacity
    }

    /// Write both matrices into the next slot and return its dynamic offset.
    fn push(&mut self, queue: &wgpu::Queue, view_projection: Mat4, world: Mat4) -> u32 {
        let offset = slot_offset(self.stride, self.next);
        self.next += 1;
        queue.write_buffer(
            &self.buffer,
            offset,
            bytemuck::bytes_of(&view_projection.to_cols_array()),
        );
        queue.write_buffer(
            &self.buffer,
            offset + MATRIX_SIZE,
            bytemuck::bytes_of(&world.to_cols_array()),
        );
        offset as u32
    }

    fn bind_group(&self, device: &wgpu::Device, program: &WgpuProgram) -> wgpu::BindGroup {
        let matrix = |offset| {
            wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &self.buffer,
                offset,
                size: wgpu::BufferSize::new(MATRIX_SIZE),
            })
        };
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}_uniforms", program.label)),
            layout: &program.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: program.slots.projection.binding,
                    resource: matrix(0),
                },
                wgpu::BindGroupEntry {
                    binding: program.slots.world.binding,
                    resource: matrix(MATRIX_SIZE),
                },
            ],
        })
    }
}

/// Surface texture, encoder and open pass of the frame being recorded.
struct FrameTarget {
    output: wgpu::SurfaceTexture,
    encoder: wgpu::CommandEncoder,
    pass: wgpu::RenderPass<'static>,
}

/// Owns the surface, device and depth buffer.
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    uniforms: UniformRing,
    bind_groups: HashMap<u32, wgpu::BindGroup>,
    next_program: u32,
    next_mesh: u32,
    frame: Option<FrameTarget>,
}

impl WgpuBackend {
    /// Create a device presenting to `target`, sized `width` x `height`.
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(target)
            .map_err(|e| RenderError::Backend(format!("create surface: {e}")))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| RenderError::Backend("no compatible GPU adapter".into()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("meshview_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| RenderError::Backend(format!("request device: {e}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| RenderError::Backend("surface reports no formats".into()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_view = create_depth_texture(&device, config.width, config.height);
        let stride = ring_stride(device.limits().min_uniform_buffer_offset_alignment);
        let uniforms = UniformRing::new(&device, stride, INITIAL_RING_SLOTS);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_view,
            uniforms,
            bind_groups: HashMap::new(),
            next_program: 0,
            next_mesh: 0,
            frame: None,
        })
    }

    /// Reconfigure the surface and depth buffer after a window resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_texture(&self.device, self.config.width, self.config.height);
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn create_pipeline(
        &self,
        program: &CompiledProgram,
        bind_group_layout: &wgpu::BindGroupLayout,
    ) -> wgpu::RenderPipeline {
        let label = program.label();
        let vertex_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label}_vs")),
            source: wgpu::ShaderSource::Wgsl(program.vertex_source().into()),
        });
        let fragment_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label}_fs")),
            source: wgpu::ShaderSource::Wgsl(program.fragment_source().into()),
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label}_pipeline_layout")),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        let attributes = vertex_attributes(&program.slots());

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{label}_pipeline")),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some(program.vertex_entry()),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: Vertex::STRIDE,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some(program.fragment_entry()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        })
    }
}

impl GraphicsBackend for WgpuBackend {
    type Program = WgpuProgram;
    type Mesh = WgpuMesh;

    fn surface_size(&self) -> Viewport {
        Viewport::new(self.config.width, self.config.height)
    }

    fn create_program(&mut self, program: &CompiledProgram) -> Result<WgpuProgram, RenderError> {
        let slots = program.slots();
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{}_uniforms", program.label())),
                entries: &uniform_layout_entries(&slots),
            });
        let pipeline = self.create_pipeline(program, &bind_group_layout);

        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::Backend(format!(
                "pipeline for `{}` rejected: {e}",
                program.label()
            )));
        }

        let id = self.next_program;
        self.next_program += 1;
        tracing::debug!(label = program.label(), id, "created render pipeline");

        Ok(WgpuProgram {
            id,
            label: program.label().to_string(),
            pipeline,
            bind_group_layout,
            slots,
        })
    }

    fn upload_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: &[u8],
        _world: Mat4,
    ) -> Result<WgpuMesh, RenderError> {
        // World matrices travel with each draw through the uniform ring.
        let id = self.next_mesh;
        self.next_mesh += 1;

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("mesh{id}_vertex_buffer")),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let wide = widen_indices(indices);
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("mesh{id}_index_buffer")),
            contents: bytemuck::cast_slice(&wide),
            usage: wgpu::BufferUsages::INDEX,
        });

        Ok(WgpuMesh {
            id,
            vertex_buffer,
            index_buffer,
            index_count: wide.len() as u32,
        })
    }

    fn begin_frame(&mut self, clear: ClearColor, viewport: Viewport) -> Result<(), RenderError> {
        if self.frame.is_some() {
            return Err(RenderError::Backend("a surface frame is already open".into()));
        }
        self.uniforms.next = 0;

        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(RenderError::SurfaceUnavailable);
            }
            Err(e) => return Err(RenderError::Backend(format!("acquire surface texture: {e}"))),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("forward_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(to_wgpu_color(clear)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            })
            .forget_lifetime();
        pass.set_viewport(
            0.0,
            0.0,
            viewport.width.min(self.config.width) as f32,
            viewport.height.min(self.config.height) as f32,
            0.0,
            1.0,
        );

        self.frame = Some(FrameTarget {
            output,
            encoder,
            pass,
        });
        Ok(())
    }

    fn set_parameters(
        &mut self,
        program: &WgpuProgram,
        mesh: &WgpuMesh,
        view_projection: Mat4,
        world: Mat4,
    ) -> Result<(), RenderError> {
        let Some(frame) = self.frame.as_mut() else {
            return Err(RenderError::Backend("set_parameters outside of a frame".into()));
        };

        if self.uniforms.is_full() {
            let capacity = self.uniforms.capacity.saturating_mul(2);
            let size = self.uniforms.stride * u64::from(capacity);
            if size > self.device.limits().max_buffer_size {
                return Err(RenderError::Backend(format!(
                    "uniform ring of {capacity} draws exceeds the device buffer limit"
                )));
            }
            // Draws already recorded keep the old buffer alive through the pass.
            self.uniforms = UniformRing::new(&self.device, self.uniforms.stride, capacity);
            self.bind_groups.clear();
            tracing::debug!(capacity, "grew uniform ring");
        }
        let offset = self.uniforms.push(&self.queue, view_projection, world);

        let device = &self.device;
        let uniforms = &self.uniforms;
        let bind_group = self
            .bind_groups
            .entry(program.id)
            .or_insert_with(|| uniforms.bind_group(device, program));

        frame.pass.set_pipeline(&program.pipeline);
        // Both uniforms live in the same slot, so their offsets are equal.
        frame.pass.set_bind_group(0, &*bind_group, &[offset, offset]);
        frame.pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        frame
            .pass
            .set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        Ok(())
    }

    fn draw_indexed(&mut self, mesh: &WgpuMesh, index_count: u32) -> Result<(), RenderError> {
        let Some(frame) = self.frame.as_mut() else {
            return Err(RenderError::Backend("draw_indexed outside of a frame".into()));
        };
        if index_count > mesh.index_count {
            return Err(RenderError::Backend(format!(
                "draw of {index_count} indices exceeds mesh {} ({})",
                mesh.id, mesh.index_count
            )));
        }
        frame.pass.draw_indexed(0..index_count, 0, 0..1);
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        let Some(FrameTarget {
            output,
            encoder,
            pass,
        }) = self.frame.take()
        else {
            return Err(RenderError::Backend("end_frame outside of a frame".into()));
        };
        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn abort_frame(&mut self) {
        // Dropping the surface texture without presenting discards it.
        self.frame = None;
    }
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

/// Bytes between uniform ring slots: two matrices, rounded up to the device's
/// dynamic offset alignment.
fn ring_stride(alignment: u32) -> u64 {
    (2 * MATRIX_SIZE).next_multiple_of(u64::from(alignment.max(1)))
}

fn slot_offset(stride: u64, slot: u32) -> u64 {
    stride * u64::from(slot)
}

fn widen_indices(indices: &[u8]) -> Vec<u16> {
    indices.iter().map(|&i| u16::from(i)).collect()
}

fn to_wgpu_color(clear: ClearColor) -> wgpu::Color {
    wgpu::Color {
        r: clear.r() as f64,
        g: clear.g() as f64,
        b: clear.b() as f64,
        a: clear.a() as f64,
    }
}

fn vertex_attributes(slots: &ProgramSlots) -> [wgpu::VertexAttribute; 2] {
    slots.vertex_attributes().map(|a| wgpu::VertexAttribute {
        format: match a.format {
            AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            AttributeFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        },
        offset: a.offset,
        shader_location: a.location,
    })
}

fn uniform_layout_entries(slots: &ProgramSlots) -> [wgpu::BindGroupLayoutEntry; 2] {
    [slots.projection.binding, slots.world.binding].map(|binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: wgpu::BufferSize::new(MATRIX_SIZE),
        },
        count: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_common::CUBE_INDICES;
    use meshview_render::{compile, shaders};

    fn color_slots() -> ProgramSlots {
        compile("color", shaders::COLOR_VS, shaders::COLOR_FS)
            .unwrap()
            .slots()
    }

    #[test]
    fn indices_widen_without_reordering() {
        let wide = widen_indices(&CUBE_INDICES);
        assert_eq!(wide.len(), CUBE_INDICES.len());
        assert!(wide.iter().zip(CUBE_INDICES).all(|(&w, n)| w == n as u16));
    }

    #[test]
    fn attributes_follow_resolved_locations() {
        let attrs = vertex_attributes(&color_slots());
        assert_eq!(attrs[0].shader_location, 0);
        assert_eq!(attrs[0].format, wgpu::VertexFormat::Float32x3);
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].shader_location, 1);
        assert_eq!(attrs[1].format, wgpu::VertexFormat::Float32x4);
        assert_eq!(attrs[1].offset, 12);
    }

    #[test]
    fn uniform_entries_use_reflected_bindings() {
        let entries = uniform_layout_entries(&color_slots());
        assert_eq!(entries[0].binding, 0);
        assert_eq!(entries[1].binding, 1);
        assert!(entries.iter().all(|e| e.visibility == wgpu::ShaderStages::VERTEX));
        assert!(entries.iter().all(|e| matches!(
            e.ty,
            wgpu::BindingType::Buffer {
                has_dynamic_offset: true,
                ..
            }
        )));
    }

    #[test]
    fn ring_slots_respect_offset_alignment() {
        assert_eq!(ring_stride(256), 256);
        assert_eq!(ring_stride(64), 128);
        assert_eq!(ring_stride(0), 128);
        let stride = ring_stride(256);
        let offsets: Vec<_> = (0..3).map(|slot| slot_offset(stride, slot)).collect();
        assert_eq!(offsets, vec![0, 256, 512]);
        assert!(offsets.windows(2).all(|w| w[1] - w[0] >= 2 * MATRIX_SIZE));
    }

    #[test]
    fn clear_color_converts_channel_for_channel() {
        let c = to_wgpu_color(ClearColor([0.25, 0.5, 0.75, 1.0]));
        assert_eq!((c.r, c.g, c.b, c.a), (0.25, 0.5, 0.75, 1.0));
    }
}
