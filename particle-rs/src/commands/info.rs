//! Animation set layout command

use std::path::PathBuf;

use anyhow::Result;

use particle_anim::ParticlePropertiesMode;

use crate::config::AnimationConfig;
use crate::utils::{add_table_row, create_table};

pub fn execute(path: PathBuf) -> Result<()> {
    let config = AnimationConfig::load(&path)?;
    let (set, _) = config.build_set()?;

    println!("Animation set: {}", path.display());
    println!("Profile:        {}", config.profile);
    println!(
        "Settings:       duration={} looping={} delay={}",
        set.settings().uses_duration,
        set.settings().uses_looping,
        set.settings().uses_delay
    );
    println!("Flags:          {:?}", set.flags());
    println!("Record stride:  {}", set.total_record_stride());
    println!("Dynamic stride: {}", set.dynamic_stride());
    println!();

    if set.nodes().next().is_none() {
        println!("No nodes.");
        return Ok(());
    }

    let mut table = create_table(vec![
        "Order", "Id", "Node", "Priority", "Block", "Mode", "Length", "Offset",
    ]);
    for (order, node) in set.nodes().enumerate() {
        let info = node.info();
        let (mode, offset) = match info.mode() {
            ParticlePropertiesMode::Global => ("global", "-".to_string()),
            ParticlePropertiesMode::LocalStatic => ("static", info.data_offset().to_string()),
            ParticlePropertiesMode::LocalDynamic => {
                ("dynamic", info.dynamic_offset().to_string())
            }
        };
        add_table_row(
            &mut table,
            vec![
                order.to_string(),
                info.id().to_string(),
                info.name().to_string(),
                info.priority().to_string(),
                format!("{:?}", info.block()),
                mode.to_string(),
                info.data_length().to_string(),
                offset,
            ],
        );
    }
    table.printstd();

    Ok(())
}
