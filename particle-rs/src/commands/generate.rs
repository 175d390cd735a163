//! Vertex data generation command

use std::f32::consts::TAU;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use glam::{Vec2, Vec3, Vec4};
use log::info;

use particle_anim::geometry::{DEFAULT_MAX_VERTICES_PER_PARTITION, GeometryIdAllocator, Mesh};
use particle_anim::{ColorTransform, ParticleGeometryBuilder, ParticleProperties};

use crate::config::AnimationConfig;
use crate::utils::{format_bytes, format_floats};

#[derive(Args)]
pub struct GenerateArgs {
    /// Path to the animation set description (JSON)
    pub config: PathBuf,

    /// Number of particles
    #[arg(short = 'n', long, default_value_t = 16)]
    pub particles: usize,

    /// Vertices of every particle
    #[arg(short = 'k', long = "vertices", default_value_t = 4)]
    pub vertices_per_particle: usize,

    /// Largest partition, in vertices
    #[arg(long, default_value_t = DEFAULT_MAX_VERTICES_PER_PARTITION)]
    pub max_vertices: usize,

    /// Start time spacing between consecutive particles, in seconds
    #[arg(long, default_value_t = 0.0)]
    pub interval: f32,

    /// Particle lifetime, in seconds
    #[arg(long, default_value_t = 1000.0)]
    pub duration: f32,

    /// Write the static buffers as little-endian f32, partition after partition
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the record of the first vertex of every particle
    #[arg(long)]
    pub dump: bool,
}

/// Deterministic properties spreading particles on a unit circle
fn demo_properties(properties: &mut ParticleProperties, interval: f32, duration: f32) {
    let t = properties.index as f32 / properties.total.max(1) as f32;
    let direction = Vec3::new((t * TAU).cos(), 0.0, (t * TAU).sin());

    properties.start_time = properties.index as f32 * interval;
    properties.duration = duration;
    properties.position = Some(direction);
    properties.velocity = Some(direction + Vec3::Y);
    properties.acceleration = Some(Vec3::NEG_Y);
    properties.scale = Some(Vec4::new(1.0, 2.0, 1.0, 0.0));
    properties.rotational_velocity = Some(Vec4::new(0.0, 1.0, 0.0, 1.0 + t));
    properties.color_start = Some(ColorTransform::default());
    properties.color_end = Some(ColorTransform::new(
        Vec4::new(1.0, t, 0.0, 1.0),
        Vec4::ZERO,
    ));
    properties.uv = Some(Vec2::new(1.0, 1.0));
}

pub fn execute(args: GenerateArgs) -> Result<()> {
    let config = AnimationConfig::load(&args.config)?;
    let (mut set, _) = config.build_set()?;

    let mut ids = GeometryIdAllocator::new();
    let mut builder = ParticleGeometryBuilder::with_max_vertices(args.max_vertices);
    for _ in 0..args.particles {
        builder.add_particle(args.vertices_per_particle);
    }
    let geometry = builder.build(&mut ids).context("Failed to build particle geometry")?;
    let runs = geometry.runs().to_vec();
    let mut mesh = Mesh::new(Arc::new(geometry.into()));

    let (interval, duration) = (args.interval, args.duration);
    set.set_initializer(move |properties| demo_properties(properties, interval, duration));
    set.generate_animation_data(&mut mesh)
        .context("Animation data generation failed")?;

    let partitions = mesh.geometry().partitions().len();
    let buffers: Vec<_> = (0..partitions)
        .filter_map(|index| mesh.animation_geometry(index))
        .collect();
    let floats: usize = buffers.iter().map(|data| data.vertex_data().len()).sum();
    let bytes = (floats * size_of::<f32>()) as u64;
    info!("Generated {} partition(s) for {} particle(s)", partitions, args.particles);

    println!("Particles:      {}", args.particles);
    println!(
        "Vertices:       {}",
        args.particles * args.vertices_per_particle
    );
    println!("Partitions:     {partitions}");
    println!("Record stride:  {}", set.total_record_stride());
    println!("Dynamic stride: {}", set.dynamic_stride());
    println!("Buffer length:  {floats} floats ({})", format_bytes(bytes));

    if args.dump {
        let mut last = None;
        for run in &runs {
            if last == Some(run.particle_index) {
                continue;
            }
            last = Some(run.particle_index);
            let Some(record) = mesh
                .animation_geometry(run.partition)
                .and_then(|data| data.vertex(run.first_vertex))
            else {
                continue;
            };
            println!(
                "  particle {:>4} p{} v{:<5} {}",
                run.particle_index,
                run.partition,
                run.first_vertex,
                format_floats(record)
            );
        }
    }

    if let Some(path) = args.output {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for data in &buffers {
            for value in data.vertex_data() {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
        writer.flush()?;
        println!("Wrote {} to {}", format_bytes(bytes), path.display());
    }

    Ok(())
}
