// Built-in starting points for both grids, selectable from the host UI's
// preset menus. A drum preset replaces only the drum grid, a bass preset
// only the piano roll; mix and effect settings are left alone.

use crate::shared::{NUM_NOTES, NUM_STEPS, NUM_TRACKS};

pub struct DrumPreset {
    pub name: &'static str,
    pub grid: [[bool; NUM_STEPS]; NUM_TRACKS],
}

pub struct BassPreset {
    pub name: &'static str,
    pub grid: [[u32; NUM_STEPS]; NUM_NOTES],
}

fn drum_row(steps: &[usize]) -> [bool; NUM_STEPS] {
    let mut row = [false; NUM_STEPS];
    for &s in steps {
        row[s] = true;
    }
    row
}

fn bass_row(notes: &[(usize, u32)]) -> [u32; NUM_STEPS] {
    let mut row = [0; NUM_STEPS];
    for &(step, duration) in notes {
        row[step] = duration;
    }
    row
}

// Track order matches the default kit: kick, snare, closed hat, clap.
pub fn drum_presets() -> Vec<DrumPreset> {
    vec![
        DrumPreset {
            name: "Four on the Floor",
            grid: [
                drum_row(&[0, 4, 8, 12]),
                drum_row(&[4, 12]),
                drum_row(&[2, 6, 10, 14]),
                drum_row(&[]),
            ],
        },
        DrumPreset {
            name: "Boom Bap",
            grid: [
                drum_row(&[0, 7, 10]),
                drum_row(&[4, 12]),
                drum_row(&[0, 2, 4, 6, 8, 10, 12, 14]),
                drum_row(&[12]),
            ],
        },
        DrumPreset {
            name: "Electro",
            grid: [
                drum_row(&[0, 6, 8, 14]),
                drum_row(&[]),
                drum_row(&[1, 3, 5, 7, 9, 11, 13, 15]),
                drum_row(&[4, 12]),
            ],
        },
    ]
}

// Rows run B at the top down to C at the bottom; see NOTE_NAMES.
pub fn bass_presets() -> Vec<BassPreset> {
    const G: usize = 4;
    const F: usize = 6;
    const D_SHARP: usize = 8;
    const C: usize = 11;

    vec![
        BassPreset {
            name: "Deep Pulse",
            grid: {
                let mut g = [[0; NUM_STEPS]; NUM_NOTES];
                g[C] = bass_row(&[(0, 2), (4, 2), (8, 2), (12, 2)]);
                g
            },
        },
        BassPreset {
            name: "Minor Walk",
            grid: {
                let mut g = [[0; NUM_STEPS]; NUM_NOTES];
                g[C] = bass_row(&[(0, 2)]);
                g[D_SHARP] = bass_row(&[(4, 2)]);
                g[F] = bass_row(&[(8, 2)]);
                g[G] = bass_row(&[(12, 2)]);
                g
            },
        },
        BassPreset {
            name: "Drone",
            grid: {
                let mut g = [[0; NUM_STEPS]; NUM_NOTES];
                g[C] = bass_row(&[(0, 8), (8, 8)]);
                g
            },
        },
    ]
}
