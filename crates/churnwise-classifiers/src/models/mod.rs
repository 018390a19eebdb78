pub mod classifier_trait;
pub mod decision_tree;
pub mod knn;

pub use classifier_trait::ClassifierModel;
pub use decision_tree::DecisionTreeClassifier;
pub use knn::KnnClassifier;
