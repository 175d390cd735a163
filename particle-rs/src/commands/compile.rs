//! Shader code generation command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use log::info;

use particle_anim::{AnimationRegisterCache, FrameState, ShaderProfile, StreamSource};

use crate::config::AnimationConfig;
use crate::utils::format_floats;

#[derive(Args)]
pub struct CompileArgs {
    /// Path to the animation set description (JSON)
    pub config: PathBuf,

    /// Source registers, position first (repeatable)
    #[arg(long = "source", value_name = "REGISTER", default_value = "va0")]
    pub sources: Vec<String>,

    /// Target temporaries matching the sources (repeatable)
    #[arg(long = "target", value_name = "REGISTER", default_value = "vt0")]
    pub targets: Vec<String>,

    /// Texture coordinate attribute
    #[arg(long, value_name = "REGISTER", default_value = "va1")]
    pub uv_source: String,

    /// Texture coordinate varying
    #[arg(long, value_name = "REGISTER", default_value = "v0")]
    pub uv_target: String,

    /// Fragment register holding the shaded color
    #[arg(long, value_name = "REGISTER", default_value = "ft0")]
    pub shaded: String,

    /// Override the profile of the description
    #[arg(long)]
    pub profile: Option<ShaderProfile>,

    /// Also stage the per-draw constants for this frame time
    #[arg(long, value_name = "SECONDS")]
    pub time: Option<f32>,
}

pub fn execute(args: CompileArgs) -> Result<()> {
    let config = AnimationConfig::load(&args.config)?;
    let (set, _) = config.build_set()?;
    let profile = args.profile.unwrap_or(config.profile);

    let sources: Vec<&str> = args.sources.iter().map(String::as_str).collect();
    let targets: Vec<&str> = args.targets.iter().map(String::as_str).collect();

    let mut cache = AnimationRegisterCache::new(profile);
    let vertex = set
        .vertex_code(&mut cache, &config.pass, profile, &sources, &targets)
        .context("Vertex code generation failed")?;
    let uv = set
        .uv_code(&mut cache, &args.uv_source, &args.uv_target)
        .context("UV code generation failed")?;
    let fragment = set
        .fragment_code(&cache, &args.shaded)
        .context("Fragment code generation failed")?;
    set.done_code(&mut cache)?;
    info!(
        "Compiled {} node(s) for profile {}",
        set.nodes().count(),
        profile
    );

    print_section("vertex", &vertex);
    print_section("uv", &uv);
    print_section("fragment", &fragment);

    let usage = cache.usage();
    println!("; usage ({profile})");
    println!(";   attribute streams:  {}", usage.streams);
    println!(";   vertex constants:   {}", usage.vertex_constants);
    println!(";   fragment constants: {}", usage.fragment_constants);
    println!(";   varyings:           {}", usage.varyings);

    if let Some(time) = args.time {
        let bindings = set
            .activate(&mut cache, &FrameState::at(time))
            .context("Failed to stage constants")?;
        println!("; streams");
        for binding in &bindings {
            let source = match binding.source {
                StreamSource::Static => "static",
                StreamSource::Dynamic => "dynamic",
            };
            let name = set
                .node(binding.node)
                .map_or("?", |node| node.info().name());
            println!(
                ";   va{} <- {source}[{}..{}] ({name})",
                binding.register,
                binding.offset,
                binding.offset + binding.components
            );
        }
        println!("; constants at t={time}");
        let first = cache.vertex_constant_offset();
        for (row, values) in cache.vertex_constant_data().chunks(4).enumerate() {
            println!(";   vc{} = {}", first + row, format_floats(values));
        }
        let first = cache.fragment_constant_offset();
        for (row, values) in cache.fragment_constant_data().chunks(4).enumerate() {
            println!(";   fc{} = {}", first + row, format_floats(values));
        }
    }

    Ok(())
}

fn print_section(name: &str, code: &str) {
    println!("; {name}");
    print!("{code}");
}
