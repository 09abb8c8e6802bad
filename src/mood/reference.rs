use super::Mood;

/// One hand-authored point in the mood space (the first three cepstral
/// coefficients) and the mood it stands for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferencePoint {
    pub features: [f64; 3],
    pub mood: Mood,
}

const fn point(features: [f64; 3], mood: Mood) -> ReferencePoint {
    ReferencePoint { features, mood }
}

/// Three well-separated groups: a mid-range pair, a bright low-energy group
/// of four, and a loud dark pair.
pub const REFERENCE_DATASET: [ReferencePoint; 8] = [
    point([0.5, 0.1, 0.3], Mood::Neutral),
    point([0.6, 0.2, 0.4], Mood::Neutral),
    point([0.1, 0.9, 0.8], Mood::Chill),
    point([0.2, 0.8, 0.9], Mood::Chill),
    point([0.9, 0.05, 0.1], Mood::Energetic),
    point([0.8, 0.1, 0.05], Mood::Energetic),
    point([0.15, 0.85, 0.85], Mood::Chill),
    point([0.05, 0.95, 0.9], Mood::Chill),
];

/// Mean position of each labelled group, in first-appearance order.
pub fn anchors(dataset: &[ReferencePoint]) -> Vec<(Mood, [f64; 3])> {
    let mut groups: Vec<(Mood, [f64; 3], usize)> = Vec::new();
    for row in dataset {
        let index = match groups.iter().position(|(mood, _, _)| *mood == row.mood) {
            Some(index) => index,
            None => {
                groups.push((row.mood, [0.0; 3], 0));
                groups.len() - 1
            }
        };
        let (_, sum, count) = &mut groups[index];
        for (s, v) in sum.iter_mut().zip(row.features) {
            *s += v;
        }
        *count += 1;
    }
    groups
        .into_iter()
        .map(|(mood, sum, count)| (mood, sum.map(|s| s / count as f64)))
        .collect()
}
