//! Application constants for the PNADC fetcher
//!
//! Fixed locations and naming conventions of the IBGE quarterly PNADC
//! microdata catalog, plus decoding defaults.

// =============================================================================
// Remote Catalog
// =============================================================================

/// IBGE public FTP server
pub const FTP_HOST: &str = "ftp.ibge.gov.br";

/// Standard FTP control port
pub const FTP_PORT: u16 = 21;

/// Anonymous login credentials accepted by the IBGE server
pub const FTP_ANONYMOUS_USER: &str = "anonymous";
pub const FTP_ANONYMOUS_PASSWORD: &str = "anonymous@";

/// Root of the quarterly microdata tree; each year lives in `{root}/{year}`
pub const DATA_FTP_PATH: &str = "/Trabalho_e_Rendimento/Pesquisa_Nacional_por_Amostra_de_Domicilios_continua/Trimestral/Microdados";

/// Documentation directory of the quarterly microdata tree
pub const DOC_FTP_PATH: &str = "/Trabalho_e_Rendimento/Pesquisa_Nacional_por_Amostra_de_Domicilios_continua/Trimestral/Microdados/Documentacao";

/// First year published by the survey
pub const START_YEAR: i32 = 2012;

// =============================================================================
// Local Naming
// =============================================================================

/// Dataset tag used as prefix of every canonical data filename
pub const DATASET_TAG: &str = "pnadc";

/// Date format of the revision component in canonical names
pub const REVISION_DATE_FORMAT: &str = "%Y%m%d";

/// Subdirectory of the data root that receives the documentation
pub const DOC_SUBDIR: &str = "[doc]";

/// Directory under the user data directory used when no root is given
pub const DEFAULT_DATA_DIR_NAME: &str = "pnadc-fetcher";

/// Extension of the downloaded microdata archives
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Extension of extracted fixed-width text files
pub const TEXT_EXTENSION: &str = "txt";

/// Documentation archive holding the SAS input dictionary
pub const DICTIONARY_ARCHIVE: &str = "Dicionario_e_input.zip";

/// SAS input file inside the dictionary archive
pub const DICTIONARY_MEMBER: &str = "Input_PNADC_trimestral.txt";

// =============================================================================
// Decoding
// =============================================================================

/// Prefix marking a column definition in the SAS input file
pub const COLUMN_MARKER: char = '@';

/// Width-token prefix marking a text column
pub const TEXT_TYPE_MARKER: char = '$';

/// Values normalised to null while decoding
pub const MISSING_MARKERS: &[&str] = &["", "NA", "."];
