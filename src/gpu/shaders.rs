//! WGSL programs for the wgpu backend
//!
//! Vertex inputs line up with the Pod rows in `render::types`. The particle
//! program repeats the CPU flow-field functions in `flow::noise` line for line,
//! so `flow::evaluate_particle` predicts what the GPU draws.

/// Camera uniform block shared by every program
pub const CAMERA_UNIFORMS: &str = r#"
struct CameraUniforms {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    camera_pos: vec3<f32>,
    _padding: f32,
}

@group(0) @binding(0) var<uniform> camera: CameraUniforms;
"#;

/// Instanced lit spheres
pub const NODE_SHADER: &str = r#"
struct MeshVertex {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct NodeInstance {
    @location(2) world_pos: vec3<f32>,
    @location(3) scale: f32,
    @location(4) color: vec3<f32>,
    @location(5) opacity: f32,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) world_position: vec3<f32>,
    @location(2) color: vec3<f32>,
    @location(3) opacity: f32,
}

@vertex
fn vs_node(mesh: MeshVertex, instance: NodeInstance) -> VertexOutput {
    var out: VertexOutput;
    let world_pos = mesh.position * instance.scale + instance.world_pos;
    out.clip_position = camera.projection * camera.view * vec4<f32>(world_pos, 1.0);
    out.world_normal = mesh.normal;
    out.world_position = world_pos;
    out.color = instance.color;
    out.opacity = instance.opacity;
    return out;
}

@fragment
fn fs_node(in: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(in.world_normal);
    let light_dir = normalize(vec3<f32>(0.5, 1.0, 0.3));
    let view_dir = normalize(camera.camera_pos - in.world_position);
    let half_dir = normalize(light_dir + view_dir);

    let ambient = 0.35;
    let diffuse = max(dot(normal, light_dir), 0.0) * 0.55;
    let specular = pow(max(dot(normal, half_dir), 0.0), 32.0) * 0.25;

    let color = in.color * (ambient + diffuse) + vec3<f32>(specular);
    return vec4<f32>(color, in.opacity);
}
"#;

/// Coloured line list, blended additively so black segments vanish
pub const EDGE_SHADER: &str = r#"
struct EdgeVertex {
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
}

@vertex
fn vs_edge(vertex: EdgeVertex) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = camera.projection * camera.view * vec4<f32>(vertex.position, 1.0);
    out.color = vertex.color;
    return out;
}

@fragment
fn fs_edge(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0);
}
"#;

/// Leaf spheres writing their big-endian RGB pick id
pub const PICK_SHADER: &str = r#"
struct MeshVertex {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct PickInstance {
    @location(2) world_pos: vec3<f32>,
    @location(3) scale: f32,
    @location(4) pick_id: u32,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) @interpolate(flat) pick_id: u32,
}

@vertex
fn vs_pick(mesh: MeshVertex, instance: PickInstance) -> VertexOutput {
    var out: VertexOutput;
    let world_pos = mesh.position * instance.scale + instance.world_pos;
    out.clip_position = camera.projection * camera.view * vec4<f32>(world_pos, 1.0);
    out.pick_id = instance.pick_id;
    return out;
}

@fragment
fn fs_pick(in: VertexOutput) -> @location(0) vec4<f32> {
    let r = f32((in.pick_id >> 16u) & 255u);
    let g = f32((in.pick_id >> 8u) & 255u);
    let b = f32(in.pick_id & 255u);
    return vec4<f32>(r / 255.0, g / 255.0, b / 255.0, 1.0);
}
"#;

/// Flow-field particle billboards
pub const PARTICLE_SHADER: &str = r#"
const WAVE_COUNT: u32 = 5u;
const CURL_EPSILON: f32 = 0.1;
const WAVE_GAIN: f32 = 0.6;
const PI: f32 = 3.14159265358979;

struct FlowUniforms {
    // time, progress, noise_scale, flow_speed
    params: vec4<f32>,
    // amplitude, point_size, waves_enabled, wave count
    shape: vec4<f32>,
    wave_motion: array<vec4<f32>, 5>,
    wave_band: array<vec4<f32>, 5>,
}

@group(1) @binding(0) var<uniform> flow: FlowUniforms;

struct ParticleInstance {
    @location(0) origin: vec3<f32>,
    @location(1) phase: f32,
    @location(2) color: vec3<f32>,
    @location(3) speed: f32,
    @location(4) size: f32,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

fn hash3(x: i32, y: i32, z: i32) -> u32 {
    var h = (bitcast<u32>(x) * 0x8da6b343u)
        ^ (bitcast<u32>(y) * 0xd8163841u)
        ^ (bitcast<u32>(z) * 0xcb1ab31fu);
    h = h ^ (h >> 16u);
    h = h * 0x7feb352du;
    h = h ^ (h >> 15u);
    h = h * 0x846ca68bu;
    return h ^ (h >> 16u);
}

fn corner(cell: vec3<i32>, offset: vec3<i32>, local: vec3<f32>) -> f32 {
    var gradients = array<vec3<f32>, 12>(
        vec3<f32>(1.0, 1.0, 0.0), vec3<f32>(-1.0, 1.0, 0.0),
        vec3<f32>(1.0, -1.0, 0.0), vec3<f32>(-1.0, -1.0, 0.0),
        vec3<f32>(1.0, 0.0, 1.0), vec3<f32>(-1.0, 0.0, 1.0),
        vec3<f32>(1.0, 0.0, -1.0), vec3<f32>(-1.0, 0.0, -1.0),
        vec3<f32>(0.0, 1.0, 1.0), vec3<f32>(0.0, -1.0, 1.0),
        vec3<f32>(0.0, 1.0, -1.0), vec3<f32>(0.0, -1.0, -1.0),
    );
    let c = cell + offset;
    let h = hash3(c.x, c.y, c.z);
    return dot(gradients[h % 12u], local - vec3<f32>(offset));
}

fn fade(t: vec3<f32>) -> vec3<f32> {
    return t * t * t * (t * (t * 6.0 - 15.0) + 10.0);
}

fn gradient_noise(p: vec3<f32>) -> f32 {
    let floor_p = floor(p);
    let cell = vec3<i32>(floor_p);
    let local = p - floor_p;
    let f = fade(local);

    let c000 = corner(cell, vec3<i32>(0, 0, 0), local);
    let c100 = corner(cell, vec3<i32>(1, 0, 0), local);
    let c010 = corner(cell, vec3<i32>(0, 1, 0), local);
    let c110 = corner(cell, vec3<i32>(1, 1, 0), local);
    let c001 = corner(cell, vec3<i32>(0, 0, 1), local);
    let c101 = corner(cell, vec3<i32>(1, 0, 1), local);
    let c011 = corner(cell, vec3<i32>(0, 1, 1), local);
    let c111 = corner(cell, vec3<i32>(1, 1, 1), local);

    let x00 = mix(c000, c100, f.x);
    let x10 = mix(c010, c110, f.x);
    let x01 = mix(c001, c101, f.x);
    let x11 = mix(c011, c111, f.x);
    return mix(mix(x00, x10, f.y), mix(x01, x11, f.y), f.z);
}

fn potential(p: vec3<f32>) -> vec3<f32> {
    return vec3<f32>(
        gradient_noise(p),
        gradient_noise(p + vec3<f32>(31.416, -47.853, 12.793)),
        gradient_noise(p + vec3<f32>(-233.145, -113.408, -185.31)),
    );
}

fn curl_noise(p: vec3<f32>) -> vec3<f32> {
    let e = CURL_EPSILON;
    let dx = vec3<f32>(e, 0.0, 0.0);
    let dy = vec3<f32>(0.0, e, 0.0);
    let dz = vec3<f32>(0.0, 0.0, e);

    let px = (potential(p + dx) - potential(p - dx)) / (2.0 * e);
    let py = (potential(p + dy) - potential(p - dy)) / (2.0 * e);
    let pz = (potential(p + dz) - potential(p - dz)) / (2.0 * e);

    return vec3<f32>(py.z - pz.y, pz.x - px.z, px.y - py.x);
}

fn flow_displacement(origin: vec3<f32>, time: f32, scale: f32, amplitude: f32) -> vec3<f32> {
    let drift = vec3<f32>(time);
    var total = curl_noise(origin * scale + drift);
    total += curl_noise(origin * scale * 0.5 + drift) * 0.5;
    total += curl_noise(origin * scale * 0.25 + drift) * 0.25;
    return total * amplitude;
}

fn hue_to_rgb(hue: f32) -> vec3<f32> {
    let h = fract(hue) * 6.0;
    let x = 1.0 - abs(h % 2.0 - 1.0);
    switch u32(h) {
        case 0u: { return vec3<f32>(1.0, x, 0.0); }
        case 1u: { return vec3<f32>(x, 1.0, 0.0); }
        case 2u: { return vec3<f32>(0.0, 1.0, x); }
        case 3u: { return vec3<f32>(0.0, x, 1.0); }
        case 4u: { return vec3<f32>(x, 0.0, 1.0); }
        default: { return vec3<f32>(1.0, 0.0, x); }
    }
}

fn wave_color(base: vec3<f32>, p: vec3<f32>, time: f32) -> vec3<f32> {
    var color = base;
    for (var i = 0u; i < WAVE_COUNT; i++) {
        let motion = flow.wave_motion[i];
        let band = flow.wave_band[i];
        let front = band.z + time * motion.w;
        let phase = PI * (dot(p, motion.xyz) - front) / band.x;
        let c = max(cos(phase), 0.0);
        color += hue_to_rgb(band.y) * c * c * WAVE_GAIN;
    }
    return clamp(color, vec3<f32>(0.0), vec3<f32>(1.0));
}

@vertex
fn vs_particle(
    @builtin(vertex_index) vertex_idx: u32,
    particle: ParticleInstance,
) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, -1.0), vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, 1.0), vec2<f32>(-1.0, 1.0),
    );
    let time = flow.params.x;
    let progress = flow.params.y;

    let drift = time * flow.params.w * particle.speed;
    let displacement = flow_displacement(particle.origin, drift, flow.params.z, flow.shape.x);
    let position = particle.origin + displacement * progress;

    var color = particle.color;
    if (flow.shape.z > 0.5) {
        color = wave_color(particle.color, position, time);
    }
    let twinkle = 0.85 + 0.15 * sin(time * 3.0 + particle.phase);
    let size = particle.size * flow.shape.y * twinkle;

    let quad = corners[vertex_idx];
    let view_pos = camera.view * vec4<f32>(position, 1.0);
    let billboard = view_pos + vec4<f32>(quad * size, 0.0, 0.0);

    var out: VertexOutput;
    out.clip_position = camera.projection * billboard;
    out.color = color;
    out.uv = quad;
    return out;
}

@fragment
fn fs_particle(in: VertexOutput) -> @location(0) vec4<f32> {
    let d2 = dot(in.uv, in.uv);
    if (d2 > 1.0) {
        discard;
    }
    let falloff = 1.0 - d2;
    return vec4<f32>(in.color * falloff, falloff);
}
"#;

pub fn node_shader() -> String {
    format!("{CAMERA_UNIFORMS}\n{NODE_SHADER}")
}

pub fn edge_shader() -> String {
    format!("{CAMERA_UNIFORMS}\n{EDGE_SHADER}")
}

pub fn pick_shader() -> String {
    format!("{CAMERA_UNIFORMS}\n{PICK_SHADER}")
}

pub fn particle_shader() -> String {
    format!("{CAMERA_UNIFORMS}\n{PARTICLE_SHADER}")
}
