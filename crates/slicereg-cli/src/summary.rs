use std::path::PathBuf;

use console::Style;
use slicereg_core::config::AlignConfig;
use slicereg_core::stack::AlignedStack;

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

pub fn print_stack_summary(config: &AlignConfig, slices: usize) {
    let s = Styles::new();
    let stack = &config.stack;
    let registration = &config.registration;

    println!();
    println!("  {}", s.title.apply_to("Stack Alignment"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(15)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Slices"),
        s.value.apply_to(slices)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Reference"),
        s.value.apply_to(stack.reference_index)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Chaining"),
        s.method
            .apply_to(if stack.relative { "relative" } else { "absolute" })
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Method"),
        s.method.apply_to(&stack.method)
    );
    println!();

    println!("  {}", s.header.apply_to("Pyramid"));
    match stack.pyramid.depth {
        Some(depth) => println!(
            "    {:<12}{}",
            s.label.apply_to("Depth"),
            s.value.apply_to(depth)
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Depth"),
            s.disabled.apply_to("auto")
        ),
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Min level"),
        s.value.apply_to(stack.pyramid.min_level)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Downscale"),
        s.value.apply_to(format!("{}x", stack.pyramid.downscale))
    );
    println!();

    println!("  {}", s.header.apply_to("Solver"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Seed"),
        s.method.apply_to(registration.initial_guess)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Borders"),
        s.method.apply_to(registration.out_of_bounds)
    );
    match registration.iterations.cap {
        Some(cap) => println!(
            "    {:<12}{}",
            s.label.apply_to("Iter cap"),
            s.value.apply_to(cap)
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Iter cap"),
            s.disabled.apply_to("none")
        ),
    }
    println!();
}

pub fn print_transforms(paths: &[PathBuf], stack: &AlignedStack) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Transforms"));
    for (path, result) in paths.iter().zip(&stack.results) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match result {
            Some(result) => println!(
                "    {}  {}  {}",
                s.path.apply_to(name),
                s.value.apply_to(result.transform),
                s.label.apply_to(format!("mse {:.3e}", result.mse))
            ),
            None => println!(
                "    {}  {}",
                s.path.apply_to(name),
                s.disabled.apply_to("reference")
            ),
        }
    }
    println!();
}
