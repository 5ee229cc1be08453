use crate::distance_measure::{squared_distance, DistanceMeasure};

#[derive(Copy, Clone, Default)]
pub struct Euclidean;

impl DistanceMeasure for Euclidean {
    fn distance(point_a: &[f64], point_b: &[f64]) -> f64 {
        squared_distance(point_a, point_b).sqrt()
    }

    fn name() -> &'static str {
        "euclidean"
    }
}

#[derive(Copy, Clone, Default)]
pub struct SquaredEuclidean;

impl DistanceMeasure for SquaredEuclidean {
    fn distance(point_a: &[f64], point_b: &[f64]) -> f64 {
        squared_distance(point_a, point_b)
    }

    fn name() -> &'static str {
        "sqeuclidean"
    }
}

#[cfg(test)]
mod tests {
    use crate::distance_measure::{condensed_index, pdist, Euclidean, SquaredEuclidean};
    use crate::DistanceMeasure;
    use ndarray::arr2;

    #[test]
    fn test_euclidean_is_root_of_squared() {
        let a = [0.0, 3.0];
        let b = [4.0, 0.0];
        assert_eq!(SquaredEuclidean::distance(&a, &b), 25.0);
        assert_eq!(Euclidean::distance(&a, &b), 5.0);
    }

    #[test]
    fn test_pdist_is_condensed_upper_triangle() {
        let points = arr2(&[[0.0, 0.0], [3.0, 4.0], [6.0, 8.0]]);
        let condensed = pdist::<Euclidean>(points.view());
        assert_eq!(condensed, vec![5.0, 10.0, 5.0]);
        assert_eq!(condensed[condensed_index(3, 0, 2)], 10.0);
        assert_eq!(condensed[condensed_index(3, 1, 2)], 5.0);
    }

    #[test]
    fn test_pdist_of_transposed_view() {
        let points = arr2(&[[0.0, 3.0], [0.0, 4.0]]);
        let condensed = pdist::<Euclidean>(points.t());
        assert_eq!(condensed, vec![5.0]);
    }
}
