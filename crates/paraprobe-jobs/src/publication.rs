//! Publication metadata for the paraprobe tool chain.

use serde::Serialize;

/// A publication describing the tools a job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Publication {
    pub title: &'static str,
    pub journal: &'static str,
    pub volume: &'static str,
    pub number: &'static str,
    pub year: &'static str,
    pub doi: &'static str,
    pub url: &'static str,
    pub authors: &'static [&'static str],
}

impl Publication {
    /// One-line citation, `Authors (year). Title. Journal volume(number). doi`.
    pub fn citation(&self) -> String {
        format!(
            "{} ({}). {}. {} {}({}). doi:{}",
            self.authors.join(", "),
            self.year,
            self.title,
            self.journal,
            self.volume,
            self.number,
            self.doi
        )
    }
}

/// Publications to cite for results produced by the paraprobe tools.
pub const PARAPROBE_PUBLICATIONS: &[Publication] = &[
    Publication {
        title: "On Strong-Scaling and Open-Source Tools for High-Throughput Quantification of Material Point Cloud Data: Composition Gradients, Microstructural Object Reconstruction, and Spatial Correlations",
        journal: "arxiv",
        volume: "1",
        number: "1",
        year: "2022",
        doi: "10.48550/arXiv.2205.13510",
        url: "https://doi.org/10.48550/arXiv.2205.13510",
        authors: &[
            "M. Kühbach", "V. V. Rielli", "S. Primig", "A. Saxena", "D. Mayweg",
            "B. Jenkins", "S. Antonov", "A. Reichmann", "S. Kardos", "L. Romaner",
            "S. Brockhauser",
        ],
    },
    Publication {
        title: "On Strong Scaling Open Source Tools for Mining Atom Probe Tomography Data",
        journal: "Microscopy and Microanalysis",
        volume: "25",
        number: "1",
        year: "2019",
        doi: "10.1017/S1431927619002228",
        url: "https://doi.org/10.1017/S1431927619002228",
        authors: &["M. Kühbach", "P. Bajaj", "A. Breen", "E. A. Jägle", "B. Gault"],
    },
    Publication {
        title: "On strong-scaling and open-source tools for analyzing atom probe tomography data",
        journal: "npj Computational Materials",
        volume: "7",
        number: "21",
        year: "2021",
        doi: "10.1038/s41524-020-00486-1",
        url: "https://doi.org/10.1038/s41524-020-00486-1",
        authors: &[
            "M. Kühbach", "P. Bajaj", "H. Zhao", "M. H. Çelik", "E. A. Jägle", "B. Gault",
        ],
    },
    Publication {
        title: "Community-Driven Methods for Open and Reproducible Software Tools for Analyzing Datasets from Atom Probe Microscopy",
        journal: "Microscopy and Microanalysis",
        volume: "1",
        number: "1",
        year: "2021",
        doi: "10.1017/S1431927621012241",
        url: "https://doi.org/10.1017/S1431927621012241",
        authors: &[
            "M. Kühbach", "A. J. London", "J. Wang", "D. K. Schreiber", "F. Mendez-Martin",
            "I. Ghamarian", "H. Bilal", "A. V.Ceguerra",
        ],
    },
    Publication {
        title: "Open and strong-scaling tools for atom-probe crystallography: high-throughput methods for indexing crystal structure and orientation",
        journal: "Journal of Applied Crystallography",
        volume: "52",
        number: "1",
        year: "2021",
        doi: "10.1107/S1600576721008578",
        url: "https://doi.org/10.1107/S1600576721008578",
        authors: &["M. Kühbach", "M. Kasemer", "A. Breen", "B. Gault"],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publications_have_dois() {
        assert_eq!(PARAPROBE_PUBLICATIONS.len(), 5);
        for publication in PARAPROBE_PUBLICATIONS {
            assert!(publication.url.ends_with(publication.doi));
        }
    }

    #[test]
    fn test_citation_format() {
        let citation = PARAPROBE_PUBLICATIONS[1].citation();
        assert!(citation.starts_with("M. Kühbach, P. Bajaj"));
        assert!(citation.contains("(2019)"));
        assert!(citation.ends_with("doi:10.1017/S1431927619002228"));
    }
}
