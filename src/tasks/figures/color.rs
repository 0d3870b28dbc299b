use anyhow::Result;
use log::error;
use plotters::prelude::RGBColor;

pub static FONT_SIZE: i32 = 28;
pub static STROKE_WIDTH: u32 = 4;

pub fn get_color_from_label(label: &str) -> Result<RGBColor> {
    match label {
        "ditto" => Ok(RGBColor(238, 44, 44)),
        "nimble" => Ok(RGBColor(70, 130, 180)),
        "nimble-group" => Ok(RGBColor(255, 130, 71)),
        "nimble-dop" => Ok(RGBColor(0, 205, 102)),
        "tab-blue" => Ok(RGBColor(31, 119, 180)),
        "tab-orange" => Ok(RGBColor(255, 127, 14)),
        "gray" => Ok(RGBColor(128, 128, 128)),
        "darkorange" => Ok(RGBColor(255, 140, 0)),
        "royalblue" => Ok(RGBColor(65, 105, 225)),
        "palegreen" => Ok(RGBColor(152, 251, 152)),
        "grid" => Ok(RGBColor(200, 200, 200)),
        _ => {
            error!("unrecognized label for color (label={label})");
            anyhow::bail!("unrecognized label (label={label})");
        }
    }
}

/// One color per query stage, used by the task timelines.
pub fn get_stage_color(stage_idx: usize) -> RGBColor {
    const STAGE_COLORS: [RGBColor; 9] = [
        RGBColor(255, 127, 36),
        RGBColor(152, 251, 152),
        RGBColor(30, 144, 255),
        RGBColor(85, 26, 139),
        RGBColor(255, 215, 0),
        RGBColor(255, 0, 0),
        RGBColor(255, 192, 203),
        RGBColor(171, 130, 255),
        RGBColor(54, 54, 54),
    ];
    STAGE_COLORS[stage_idx % STAGE_COLORS.len()]
}
