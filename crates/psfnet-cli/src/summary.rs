use std::path::Path;

use console::Style;
use psfnet_core::network::KernelNetwork;
use psfnet_core::KernelNetConfig;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_estimate_summary(
    config: &KernelNetConfig,
    weights: Option<&Path>,
    n_images: usize,
    batch_size: usize,
) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Kernel Estimation"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(17)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Images"),
        s.value.apply_to(n_images)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Batch size"),
        s.value.apply_to(batch_size.max(1))
    );
    match weights {
        Some(path) => println!(
            "  {:<14}{}",
            s.label.apply_to("Weights"),
            s.path.apply_to(path.display())
        ),
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Weights"),
            s.disabled.apply_to(format!("untrained (seed {})", config.seed))
        ),
    }
    println!();

    print_config_section(&s, config);
}

fn print_config_section(s: &Styles, config: &KernelNetConfig) {
    println!("  {}", s.header.apply_to("Network"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Levels"),
        s.value.apply_to(config.n_levels)
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Kernel"),
        s.value.apply_to(format!(
            "{}x{}",
            config.kernel_width(),
            config.kernel_height()
        ))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Activation"),
        s.method.apply_to(config.activation)
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Flips"),
        s.value.apply_to(if config.is_add_flips { "yes" } else { "no" })
    );
    match config.max_input_size {
        Some(bound) => println!(
            "    {:<14}{}",
            s.label.apply_to("Max input"),
            s.value.apply_to(bound)
        ),
        None => println!(
            "    {:<14}{}",
            s.label.apply_to("Max input"),
            s.disabled.apply_to("unbounded")
        ),
    }
    println!();
}

/// Pyramid levels with their shift windows, optionally every layer.
pub fn print_architecture(network: &KernelNetwork, layers: bool) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Kernel Network"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(14)));
    println!();

    let (kh, kw) = network.kernel_size();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.value.apply_to(format!("{}x{} kernel", kw, kh))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Parameters"),
        s.value.apply_to(network.parameter_count())
    );
    println!();

    println!("  {}", s.header.apply_to("Pyramid"));
    for level in &network.encoder.levels {
        let window = level.correlation.window;
        let (oh, ow) = window.output_size();
        println!(
            "    {:<12}{}",
            s.label.apply_to(format!("Level {}", level.index)),
            s.value.apply_to(format!(
                "shift \u{00b1}{}x\u{00b1}{}  ->  {}x{} map, {} channels",
                window.x,
                window.y,
                ow,
                oh,
                level.cc_out.weights.out_channels()
            ))
        );
    }
    println!();

    if layers {
        println!("  {}", s.header.apply_to("Layers"));
        for (name, w) in network.named_weights() {
            let (fh, fw) = w.filter_size();
            println!(
                "    {:<22}{}",
                s.label.apply_to(name),
                s.value.apply_to(format!(
                    "{}x{}  {} -> {}",
                    fw,
                    fh,
                    w.in_channels(),
                    w.out_channels()
                ))
            );
        }
        println!();
    }
}
