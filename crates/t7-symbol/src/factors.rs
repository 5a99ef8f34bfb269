//! Correction factors and units for well-known Trionic 7 symbols

/// Fixed correction factor for `name`, "1" when the raw value is used as is
pub fn correction_factor(name: &str) -> &'static str {
    match name {
        "IgnProt.fi_Offset" | "Out.X_AccPedal" | "Out.fi_Ignition" | "Out.PWM_BoostCntrl"
        | "In.v_Vehicle" | "In.p_AirAmbient" => "0.1",
        "ECMStat.p_Diff" | "ECMStat.p_DiffThrot" | "In.p_AirBefThrottle" | "In.p_AirInlet" => {
            "0.001"
        }
        _ => "1",
    }
}

/// Unit derived from the quantity prefix of a symbol name
///
/// Names follow `Module.q_Description`, where `q` names the physical
/// quantity (`n` speed, `p` pressure, `T` temperature and so on). Unknown
/// prefixes yield an empty unit.
pub fn unit(name: &str) -> &'static str {
    let local = name.rsplit('.').next().unwrap_or(name);
    let Some((quantity, _)) = local.split_once('_') else {
        return "";
    };

    match quantity {
        "n" => "rpm",
        "p" => "kPa",
        "T" => "°C",
        "U" => "V",
        "X" | "PWM" => "%",
        "fi" => "°",
        "v" => "km/h",
        "m" => "mg/c",
        "t" => "ms",
        "I" => "A",
        "Q" => "mg/s",
        "M" => "Nm",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_factors() {
        assert_eq!(correction_factor("In.v_Vehicle"), "0.1");
        assert_eq!(correction_factor("In.p_AirInlet"), "0.001");
        assert_eq!(correction_factor("ActualIn.n_Engine"), "1");
        // exact match only
        assert_eq!(correction_factor("in.v_vehicle"), "1");
    }

    #[test]
    fn units_from_prefix() {
        assert_eq!(unit("ActualIn.n_Engine"), "rpm");
        assert_eq!(unit("ActualIn.T_Engine"), "°C");
        assert_eq!(unit("Out.X_AccPedal"), "%");
        assert_eq!(unit("Out.fi_Ignition"), "°");
        assert_eq!(unit("MAF.m_AirInlet"), "mg/c");
        assert_eq!(unit("Lambda.LambdaInt"), "");
        assert_eq!(unit("Symbol-12"), "");
    }
}
