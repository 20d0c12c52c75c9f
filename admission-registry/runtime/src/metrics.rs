use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub(crate) struct AdmissionMetrics {
    reviews: Family<ReviewLabels, Counter>,
    rejected: Family<RejectLabels, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct ReviewLabels {
    path: &'static str,
    allowed: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct RejectLabels {
    reason: &'static str,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub(crate) fn register(reg: &mut Registry) -> Self {
        let reviews = Family::<ReviewLabels, Counter>::default();
        reg.register(
            "reviews",
            "Total number of admission decisions returned, by policy path",
            reviews.clone(),
        );

        let rejected = Family::<RejectLabels, Counter>::default();
        reg.register(
            "rejected",
            "Total number of admission requests that could not be reviewed",
            rejected.clone(),
        );

        Self { reviews, rejected }
    }

    pub(crate) fn review(&self, path: &'static str, allowed: bool) {
        self.reviews
            .get_or_create(&ReviewLabels {
                path,
                allowed: if allowed { "true" } else { "false" },
            })
            .inc();
    }

    pub(crate) fn reject(&self, reason: &'static str) {
        self.rejected.get_or_create(&RejectLabels { reason }).inc();
    }

    #[cfg(test)]
    pub(crate) fn reviews(&self, path: &'static str, allowed: bool) -> u64 {
        self.reviews
            .get_or_create(&ReviewLabels {
                path,
                allowed: if allowed { "true" } else { "false" },
            })
            .get()
    }

    #[cfg(test)]
    pub(crate) fn rejections(&self, reason: &'static str) -> u64 {
        self.rejected.get_or_create(&RejectLabels { reason }).get()
    }
}
