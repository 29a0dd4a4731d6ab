use super::detection::{DetectionSet, ObjectClass};

/// Per-frame totals for the two tracked classes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectCounts {
    pub person: usize,
    pub head: usize,
}

impl ObjectCounts {
    pub fn new(person: usize, head: usize) -> Self {
        Self { person, head }
    }

    /// Counts `Person` and `Head` detections; other classes are ignored.
    pub fn count(detections: &DetectionSet) -> Self {
        detections.iter().fold(Self::default(), |mut acc, d| {
            match d.class() {
                ObjectClass::Person => acc.person += 1,
                ObjectClass::Head => acc.head += 1,
                ObjectClass::Other => {}
            }
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::Detection;
    use crate::shared::bounding_box::BoundingBox;
    use rstest::rstest;

    fn set_of(labels: &[&str]) -> DetectionSet {
        labels
            .iter()
            .map(|l| Detection::new(*l, 0.9, BoundingBox::new(0.0, 0.0, 5.0, 5.0)))
            .collect()
    }

    #[rstest]
    #[case::empty(&[], 0, 0)]
    #[case::only_people(&["Person", "Person", "Person"], 3, 0)]
    #[case::mixed(&["Person", "Head", "Head", "Person", "Head"], 2, 3)]
    #[case::unknown_ignored(&["Helmet", "Person", "Bag"], 1, 0)]
    #[case::case_sensitive(&["person", "head", "Person"], 1, 0)]
    fn test_count(#[case] labels: &[&str], #[case] person: usize, #[case] head: usize) {
        let set = set_of(labels);
        let counts = ObjectCounts::count(&set);
        assert_eq!(counts, ObjectCounts::new(person, head));
        assert!(counts.person + counts.head <= set.len());
    }

    #[test]
    fn test_count_matches_label_filter() {
        let labels = ["Head", "Person", "Other", "Head", "Person", "Person"];
        let set = set_of(&labels);
        let counts = ObjectCounts::count(&set);
        assert_eq!(counts.person, labels.iter().filter(|l| **l == "Person").count());
        assert_eq!(counts.head, labels.iter().filter(|l| **l == "Head").count());
    }
}
