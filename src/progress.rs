use indicatif::{ProgressBar, ProgressStyle};

/// A progress bar in the house style, or a hidden one when `visible` is false.
pub fn bar(len: u64, label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    let template = format!(
        "{{spinner:.green}} [{{elapsed_precise}}] [{{wide_bar:.cyan/blue}}] {{pos}}/{{len}} ({{eta}}) {label}"
    );
    match ProgressStyle::default_bar().template(&template) {
        Ok(style) => pb.set_style(style),
        Err(e) => log::debug!("progress style rejected: {}", e),
    }
    pb
}
